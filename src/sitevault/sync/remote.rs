use crate::error::{Result, SiteError};
use crate::model::{records_from_value, type_name, Collection, Record};
use serde_json::Value;
use std::time::Duration;

/// The content API as seen by sync: `GET <base>/<collection>` and
/// `PUT <base>/<collection>[/<id>]` with a partial body.
pub trait RemoteApi {
    fn fetch_collection(&self, collection: Collection) -> Result<Value>;

    fn put_collection(&self, collection: Collection, id: Option<&Value>, body: &Value) -> Result<()>;

    fn fetch_records(&self, collection: Collection) -> Result<Vec<Record>> {
        records_from_value(self.fetch_collection(collection)?)
    }
}

pub struct HttpRemote {
    base_url: String,
    agent: ureq::Agent,
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            token: None,
        }
    }

    /// Bearer token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, collection: Collection, id: Option<&Value>) -> String {
        match id {
            Some(Value::String(s)) => format!("{}/{}/{}", self.base_url, collection, s),
            Some(other) => format!("{}/{}/{}", self.base_url, collection, other),
            None => format!("{}/{}", self.base_url, collection),
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let req = self
            .agent
            .request(method, url)
            .set("User-Agent", "sitevault-sync")
            .set("Accept", "application/json");
        match &self.token {
            Some(token) => req.set("Authorization", &format!("Bearer {}", token)),
            None => req,
        }
    }
}

impl RemoteApi for HttpRemote {
    fn fetch_collection(&self, collection: Collection) -> Result<Value> {
        let url = self.url(collection, None);
        let resp = self
            .request("GET", &url)
            .call()
            .map_err(|e| SiteError::Fetch(format!("{}: {}", url, e)))?;
        let body = resp
            .into_string()
            .map_err(|e| SiteError::Fetch(format!("{}: failed to read body: {}", url, e)))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| SiteError::Fetch(format!("{}: not JSON: {}", url, e)))?;
        check_shape(collection, value)
    }

    fn put_collection(&self, collection: Collection, id: Option<&Value>, body: &Value) -> Result<()> {
        let url = self.url(collection, id);
        let payload = serde_json::to_string(body)?;
        self.request("PUT", &url)
            .set("Content-Type", "application/json")
            .send_string(&payload)
            .map_err(|e| SiteError::Sync(format!("PUT {}: {}", url, e)))?;
        Ok(())
    }
}

/// Lists must come back as arrays and settings as an object.
pub fn check_shape(collection: Collection, value: Value) -> Result<Value> {
    let ok = if collection.is_singleton() {
        value.is_object()
    } else {
        value.is_array()
    };
    if ok {
        Ok(value)
    } else {
        Err(SiteError::Shape(format!(
            "{} returned {}",
            collection,
            type_name(&value)
        )))
    }
}
