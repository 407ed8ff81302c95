//! KVdb bucket client

use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use crate::config::{normalize_base_url, ClientConfig, DEFAULT_BASE_URL};
use crate::error::{Error, Result};
use crate::request::{self, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
use crate::response;
use crate::transport::{HttpRequest, HyperTransport, Transport};
use crate::types::*;

/// Client for a single KVdb bucket
///
/// Every call is an independent request; the client only holds its configuration
/// and a shared transport, so clones are cheap and can be used concurrently.
///
/// # Example
/// ```rust,no_run
/// use kvdb_client::{AuthMode, Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), kvdb_client::Error> {
///     let client = Client::new(
///         ClientConfig::new("my-bucket")
///             .with_token("my-token")
///             .with_auth_mode(AuthMode::Bearer),
///     )?;
///
///     client.set("greeting", "hello", &Default::default()).await?;
///     let value = client.get("greeting", &Default::default()).await?;
///     println!("{}", value);
///     Ok(())
/// }
/// ```
pub struct Client<T = HyperTransport> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("bucket", &self.config.bucket)
            .field("auth_mode", &self.config.auth_mode)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl Client<HyperTransport> {
    /// Create a client using the bundled hyper transport
    ///
    /// # Errors
    /// Returns an error if the bucket is blank or the base URL is invalid
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_transport(config, HyperTransport::new()?)
    }

    /// Provision a new bucket and return its id
    ///
    /// The request is unauthenticated.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, CreateBucketOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// let bucket = Client::create_bucket("me@example.com", &CreateBucketOptions::default()).await?;
    /// println!("new bucket: {}", bucket);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn create_bucket(email: &str, options: &CreateBucketOptions) -> Result<String> {
        let transport = HyperTransport::new()?;
        create_bucket_with(&transport, email, options).await
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over a custom transport
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config.validated()?),
            transport: Arc::new(transport),
        })
    }

    /// Get the bucket id
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Get the normalized base URL
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the full configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authorize, send and decode
    async fn request(&self, request: HttpRequest) -> Result<Payload> {
        // logged before the credential can reach the URL
        debug!("Sending request: {} {}", request.method, request.url);
        let request = request::authorize(&self.config, request);
        let response = self.transport.send(request).await?;
        response::decode(response)
    }

    /// Retrieve a value by key
    ///
    /// JSON responses are decoded; with `parse_json` a text body is parsed as well.
    /// Bodies that fail to parse come back as [`Payload::Text`]; non-UTF-8 bodies
    /// come back untouched as [`Payload::Binary`].
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, ClientConfig, GetOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// # let client = Client::new(ClientConfig::new("bucket"))?;
    /// let data = client.get("myData", &GetOptions { parse_json: true }).await?;
    /// if let Some(obj) = data.as_json() {
    ///     println!("name = {}", obj["name"]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, key: &str, options: &GetOptions) -> Result<Payload> {
        let url = request::key_url(&self.config, key, None)?;
        let payload = self.request(HttpRequest::new(Method::GET, url)).await?;
        Ok(if options.parse_json {
            response::force_json(payload)
        } else {
            payload
        })
    }

    /// Store a value, replacing any previous one
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, ClientConfig, SetOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// # let client = Client::new(ClientConfig::new("bucket"))?;
    /// client.set("myName", "n0bisuke", &SetOptions::default()).await?;
    /// client
    ///     .set("myData", serde_json::json!({"name": "test", "value": 123}), &SetOptions::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set(&self, key: &str, value: impl Into<Value>, options: &SetOptions) -> Result<Payload> {
        self.write(Method::POST, key, value.into(), options).await
    }

    /// Update a value with PATCH; serialization is identical to [`Client::set`]
    pub async fn update(&self, key: &str, value: impl Into<Value>, options: &SetOptions) -> Result<Payload> {
        self.write(Method::PATCH, key, value.into(), options).await
    }

    async fn write(&self, method: Method, key: &str, value: Value, options: &SetOptions) -> Result<Payload> {
        let url = request::key_url(&self.config, key, options.ttl)?;
        let body = request::serialize_value(&value, options)?;
        let mut req = HttpRequest::new(method, url).body(body.bytes);
        if let Some(content_type) = body.content_type {
            req = req.header("content-type", content_type);
        }
        self.request(req).await
    }

    /// Add `amount` to a numeric value
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, ClientConfig, CounterOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// # let client = Client::new(ClientConfig::new("bucket"))?;
    /// let visits = client.increment("visits", 1, &CounterOptions::default()).await?;
    /// println!("visits: {}", visits);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn increment(&self, key: &str, amount: i64, options: &CounterOptions) -> Result<Payload> {
        let url = request::key_url(&self.config, key, options.ttl)?;
        let req = HttpRequest::new(Method::PATCH, url)
            .header("content-type", CONTENT_TYPE_TEXT)
            .body(request::increment_body(amount));
        self.request(req).await
    }

    /// Subtract `|amount|` from a numeric value
    pub async fn decrement(&self, key: &str, amount: i64, options: &CounterOptions) -> Result<Payload> {
        self.increment(key, request::decrement_amount(amount), options).await
    }

    /// Delete a key
    pub async fn delete(&self, key: &str) -> Result<Payload> {
        let url = request::key_url(&self.config, key, None)?;
        self.request(HttpRequest::new(Method::DELETE, url)).await
    }

    /// List keys, optionally with values
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, ClientConfig, ListOptions};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// # let client = Client::new(ClientConfig::new("bucket"))?;
    /// let options = ListOptions {
    ///     prefix: Some("users:".to_string()),
    ///     limit: Some(100),
    ///     ..Default::default()
    /// };
    /// let keys = client.list(&options).await?;
    /// println!("{}", keys);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list(&self, options: &ListOptions) -> Result<Payload> {
        let url = request::list_url(&self.config, &request::list_query(options));
        let payload = self.request(HttpRequest::new(Method::GET, url)).await?;
        Ok(if options.wants_json() {
            response::force_json(payload)
        } else {
            payload
        })
    }

    /// Apply set and delete operations atomically, in order
    ///
    /// # Example
    /// ```rust,no_run
    /// # use kvdb_client::{Client, ClientConfig, TxnOp};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), kvdb_client::Error> {
    /// # let client = Client::new(ClientConfig::new("bucket"))?;
    /// client
    ///     .transaction(&[
    ///         TxnOp::set("users:email:new@example.com", "user 1"),
    ///         TxnOp::delete("users:email:old@example.com"),
    ///     ])
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn transaction(&self, operations: &[TxnOp]) -> Result<Payload> {
        let body = request::transaction_body(operations)?;
        let req = HttpRequest::new(Method::POST, request::bucket_url(&self.config))
            .header("content-type", CONTENT_TYPE_JSON)
            .body(body);
        self.request(req).await
    }

    /// Issue a scoped access token for this bucket
    pub async fn create_access_token(&self, options: &AccessTokenOptions) -> Result<Payload> {
        let req = HttpRequest::new(Method::POST, request::tokens_url(&self.config))
            .header("content-type", CONTENT_TYPE_FORM)
            .body(request::access_token_form(options));
        self.request(req).await
    }

    /// Change keys or default ttl of this bucket; absent fields are left alone
    pub async fn update_bucket_policy(&self, policy: &BucketPolicy) -> Result<Payload> {
        let req = HttpRequest::new(Method::PATCH, request::bucket_url(&self.config))
            .header("content-type", CONTENT_TYPE_FORM)
            .body(request::policy_form(None, policy));
        self.request(req).await
    }

    /// Delete this bucket and everything in it
    pub async fn delete_bucket(&self) -> Result<Payload> {
        let url = request::list_url(&self.config, "");
        self.request(HttpRequest::new(Method::DELETE, url)).await
    }
}

/// Provision a new bucket through `transport`, returning the raw bucket id text
pub async fn create_bucket_with<T: Transport + ?Sized>(
    transport: &T,
    email: &str,
    options: &CreateBucketOptions,
) -> Result<String> {
    if email.trim().is_empty() {
        return Err(Error::Validation("email is required".to_string()));
    }

    let base_url = options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let url = normalize_base_url(base_url).to_string();
    debug!("Creating bucket at {}", url);

    let req = HttpRequest::new(Method::POST, url)
        .header("content-type", CONTENT_TYPE_FORM)
        .body(request::policy_form(Some(email), &options.policy));
    let response = transport.send(req).await?;
    response::decode_text(response)
}
