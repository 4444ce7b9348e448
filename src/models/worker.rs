use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: String,
    pub display_name: String,
    pub status: WorkerStatus,
    pub services: Vec<String>,
}

impl Worker {
    pub fn is_active(&self) -> bool {
        self.status == WorkerStatus::Active
    }

    pub fn is_qualified_for(&self, service_id: &str) -> bool {
        self.services.iter().any(|s| s == service_id)
    }

    pub fn summary(&self) -> WorkerSummary {
        WorkerSummary {
            worker_id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Active,
    Inactive,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(WorkerStatus::Active),
            "inactive" => Some(WorkerStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub display_name: String,
}
