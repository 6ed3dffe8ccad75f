use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::common::{Displayable, Identifiable};

/// A school year administered in the catalog, e.g. "2024-2025".
///
/// Years are created and edited by administrators and are never deleted
/// while enrollments reference them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcademicYear {
    pub id: Uuid,
    pub label: String,
    pub active: bool,
}

impl AcademicYear {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Identifiable for AcademicYear {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for AcademicYear {
    fn display_label(&self) -> String {
        if self.active {
            self.label.clone()
        } else {
            format!("{} (inactive)", self.label)
        }
    }
}
