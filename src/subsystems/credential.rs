//! Credential sub-engine, spec.md §4.3.4.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: String,
    pub issuer: String,
    pub subject: String,
    pub credential_type: String,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialManager {
    entries: BTreeMap<String, Credential>,
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, credential: Credential) -> Result<(), String> {
        if self.entries.contains_key(&credential.credential_id) {
            return Err("credential already exists".to_string());
        }
        self.entries.insert(credential.credential_id.clone(), credential);
        Ok(())
    }

    pub fn accept(&mut self, credential_id: &str, subject: &str) -> Result<(), String> {
        let credential = self.entries.get_mut(credential_id).ok_or_else(|| "no such credential".to_string())?;
        if credential.subject != subject {
            return Err("not the credential subject".to_string());
        }
        credential.accepted = true;
        Ok(())
    }

    pub fn delete(&mut self, credential_id: &str, requester: &str) -> Result<(), String> {
        let credential = self.entries.get(credential_id).ok_or_else(|| "no such credential".to_string())?;
        if credential.issuer != requester && credential.subject != requester {
            return Err("not authorized to delete".to_string());
        }
        self.entries.remove(credential_id);
        Ok(())
    }

    pub fn get(&self, credential_id: &str) -> Option<&Credential> {
        self.entries.get(credential_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_subject_can_accept() {
        let mut mgr = CredentialManager::new();
        mgr.create(Credential { credential_id: "c1".into(), issuer: "rIssuer".into(), subject: "rSubject".into(), credential_type: "kyc".into(), accepted: false }).unwrap();
        assert!(mgr.accept("c1", "rOther").is_err());
        assert!(mgr.accept("c1", "rSubject").is_ok());
        assert!(mgr.get("c1").unwrap().accepted);
    }
}
