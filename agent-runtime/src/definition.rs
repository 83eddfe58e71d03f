use persona_core::Persona;
use serde::{Deserialize, Serialize};

/// Who the agent is and what it is trying to achieve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub goal: String,
    pub description: String,
}

impl From<&Persona> for AgentDefinition {
    fn from(persona: &Persona) -> Self {
        Self {
            name: persona.name.clone(),
            goal: persona.goal.clone(),
            description: persona.description.clone(),
        }
    }
}
