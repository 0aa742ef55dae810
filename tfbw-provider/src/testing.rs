//! In-memory Secrets Manager used by the provider tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tfbw_core::{
    ClientConnector, ClientError, ClientSettings, ConnectError, DeleteOutcome, ProjectRecord,
    ProjectsApi, SecretInput, SecretRecord, SecretsApi, SecretsManagerClient,
};
use zeroize::Zeroizing;

pub const ORG_ID: &str = "0b4f7c55-8b48-4a49-9f40-5f0c2c3f1c11";

#[derive(Default)]
struct Store {
    projects: BTreeMap<String, ProjectRecord>,
    secrets: BTreeMap<String, SecretRecord>,
    next_id: u64,
    /// Every call fails with this API error once set.
    fail: Option<String>,
    delete_errors: BTreeMap<String, String>,
    calls: Vec<String>,
}

impl Store {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012}", self.next_id)
    }

    fn enter(&mut self, call: String) -> Result<(), ClientError> {
        self.calls.push(call);
        match &self.fail {
            Some(msg) => Err(ClientError::Api(msg.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryClient {
    store: Mutex<Store>,
}

impl MemoryClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, msg: &str) {
        self.store.lock().unwrap().fail = Some(msg.to_string());
    }

    pub fn fail_delete_of(&self, id: &str, msg: &str) {
        self.store
            .lock()
            .unwrap()
            .delete_errors
            .insert(id.to_string(), msg.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.store.lock().unwrap().calls.clone()
    }

    pub fn insert_project(&self, name: &str) -> ProjectRecord {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let record = ProjectRecord {
            id: store.next_id(),
            organization_id: ORG_ID.to_string(),
            name: name.to_string(),
            creation_date: now,
            revision_date: now,
        };
        store.projects.insert(record.id.clone(), record.clone());
        record
    }

    pub fn insert_secret(&self, key: &str, value: &str, note: &str, project_ids: &[&str]) -> SecretRecord {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let record = SecretRecord {
            id: store.next_id(),
            organization_id: ORG_ID.to_string(),
            project_ids: project_ids.iter().map(|p| p.to_string()).collect(),
            key: key.to_string(),
            value: Zeroizing::new(value.to_string()),
            note: Zeroizing::new(note.to_string()),
            creation_date: now,
            revision_date: now,
        };
        store.secrets.insert(record.id.clone(), record.clone());
        record
    }

    pub fn project(&self, id: &str) -> Option<ProjectRecord> {
        self.store.lock().unwrap().projects.get(id).cloned()
    }

    pub fn secret(&self, id: &str) -> Option<SecretRecord> {
        self.store.lock().unwrap().secrets.get(id).cloned()
    }
}

fn delete_from<T>(
    map: &mut BTreeMap<String, T>,
    errors: &BTreeMap<String, String>,
    ids: &[String],
) -> Vec<DeleteOutcome> {
    ids.iter()
        .map(|id| {
            let error = match errors.get(id) {
                Some(msg) => Some(msg.clone()),
                None => map.remove(id).is_none().then(|| "not found".to_string()),
            };
            DeleteOutcome {
                id: id.clone(),
                error,
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl ProjectsApi for MemoryClient {
    async fn get(&self, id: &str) -> Result<ProjectRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("projects.get {id}"))?;
        store
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("project {id}")))
    }

    async fn create(&self, organization_id: &str, name: &str) -> Result<ProjectRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("projects.create {organization_id} {name}"))?;
        let now = Utc::now();
        let record = ProjectRecord {
            id: store.next_id(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            creation_date: now,
            revision_date: now,
        };
        store.projects.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, organization_id: &str, name: &str) -> Result<ProjectRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("projects.update {id} {organization_id} {name}"))?;
        let record = store
            .projects
            .get_mut(id)
            .ok_or_else(|| ClientError::NotFound(format!("project {id}")))?;
        record.name = name.to_string();
        record.revision_date = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("projects.delete {}", ids.join(",")))?;
        let Store {
            projects,
            delete_errors,
            ..
        } = &mut *store;
        Ok(delete_from(projects, delete_errors, ids))
    }
}

#[async_trait::async_trait]
impl SecretsApi for MemoryClient {
    async fn get(&self, id: &str) -> Result<SecretRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("secrets.get {id}"))?;
        store
            .secrets
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("secret {id}")))
    }

    async fn create(&self, input: &SecretInput) -> Result<SecretRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("secrets.create {} {}", input.organization_id, input.key))?;
        let now = Utc::now();
        let record = SecretRecord {
            id: store.next_id(),
            organization_id: input.organization_id.clone(),
            project_ids: input.project_ids.clone(),
            key: input.key.clone(),
            value: input.value.clone(),
            note: input.note.clone(),
            creation_date: now,
            revision_date: now,
        };
        store.secrets.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, input: &SecretInput) -> Result<SecretRecord, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("secrets.update {id} {}", input.key))?;
        let record = store
            .secrets
            .get_mut(id)
            .ok_or_else(|| ClientError::NotFound(format!("secret {id}")))?;
        record.key = input.key.clone();
        record.value = input.value.clone();
        record.note = input.note.clone();
        record.project_ids = input.project_ids.clone();
        record.revision_date = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<Vec<DeleteOutcome>, ClientError> {
        let mut store = self.store.lock().unwrap();
        store.enter(format!("secrets.delete {}", ids.join(",")))?;
        let Store {
            secrets,
            delete_errors,
            ..
        } = &mut *store;
        Ok(delete_from(secrets, delete_errors, ids))
    }
}

impl SecretsManagerClient for MemoryClient {
    fn organization_id(&self) -> &str {
        ORG_ID
    }

    fn projects(&self) -> &dyn ProjectsApi {
        self
    }

    fn secrets(&self) -> &dyn SecretsApi {
        self
    }
}

/// Connector handing out a shared [`MemoryClient`] and recording what it was
/// asked to connect with.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub client: Arc<MemoryClient>,
    last_call: Arc<Mutex<Option<(ClientSettings, String)>>>,
    failure: Arc<Mutex<Option<ConnectError>>>,
}

impl MemoryConnector {
    pub fn failing_login(error: ClientError) -> Self {
        Self::failing(ConnectError::Login(error))
    }

    pub fn failing_build(error: ClientError) -> Self {
        Self::failing(ConnectError::Build(error))
    }

    fn failing(error: ConnectError) -> Self {
        let connector = Self::default();
        *connector.failure.lock().unwrap() = Some(error);
        connector
    }

    pub fn last_call(&self) -> Option<(ClientSettings, String)> {
        self.last_call.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClientConnector for MemoryConnector {
    async fn connect(
        &self,
        settings: &ClientSettings,
        access_token: &str,
    ) -> Result<Arc<dyn SecretsManagerClient>, ConnectError> {
        *self.last_call.lock().unwrap() = Some((settings.clone(), access_token.to_string()));
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.client.clone())
    }
}
