use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusoto_core::{ByteStream, HttpClient, Region, RusotoError};
use rusoto_credential::StaticProvider;
use rusoto_s3::{
    DeleteObjectRequest, ListObjectsV2Request, PutObjectRequest, S3Client, S3,
};
use tokio::runtime::{Builder, Runtime};

use crate::config::S3Settings;
use crate::constants::{AWS_ENDPOINT_MARKER, DEFAULT_S3_REGION};
use crate::storage::{ObjectDescriptor, ObjectStore, ProviderError, StorageConnector, StorageFailure};

/// Builds rusoto S3 clients from settings and verifies them with a bucket
/// listing before handing them out.
pub struct S3Connector {
    settings: S3Settings,
}

impl S3Connector {
    pub fn new(settings: &S3Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl StorageConnector for S3Connector {
    fn connect(&self) -> Result<Box<dyn ObjectStore>, StorageFailure> {
        // The rest of the cycle is blocking; rusoto futures run here
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageFailure::Other(format!("failed to create Tokio runtime: {}", e)))?;

        let region = resolve_region(&self.settings);
        debug!("Using S3 region {:?}", region);

        let client = {
            let _guard = runtime.enter();
            let http_client = HttpClient::new().map_err(|e| {
                StorageFailure::Other(format!("failed to create HTTP client: {}", e))
            })?;
            let credentials = StaticProvider::new_minimal(
                self.settings.access_key.expose().to_string(),
                self.settings.secret_key.expose().to_string(),
            );
            S3Client::new_with(http_client, credentials, region)
        };

        // Lightweight call to validate endpoint and credentials
        runtime.block_on(client.list_buckets()).map_err(classify)?;

        Ok(Box::new(S3Store {
            client,
            bucket: self.settings.bucket.clone(),
            runtime,
        }))
    }
}

/// Pick the rusoto region for the configured endpoint.
///
/// Requests always go to the configured endpoint, which rusoto addresses
/// path-style (`/<bucket>/<key>`). The region name is only used for request
/// signing: `S3_REGION` when set, otherwise the region embedded in an AWS
/// host name, otherwise the default.
fn resolve_region(settings: &S3Settings) -> Region {
    let name = settings
        .region
        .clone()
        .or_else(|| region_from_endpoint(&settings.endpoint))
        .unwrap_or_else(|| DEFAULT_S3_REGION.to_string());

    Region::Custom {
        name,
        endpoint: settings.endpoint.clone(),
    }
}

/// Region label of an AWS endpoint such as `s3.eu-west-1.amazonaws.com`,
/// `s3.dualstack.eu-west-1.amazonaws.com` or
/// `bucket.vpce-0a1b.s3.eu-west-1.vpce.amazonaws.com`.
fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint
        .split("://")
        .last()?
        .split(|c| c == '/' || c == ':')
        .next()?;
    if !host.contains(AWS_ENDPOINT_MARKER) {
        return None;
    }

    host.split('.')
        .find(|label| label.parse::<Region>().is_ok())
        .map(str::to_string)
}

/// Classify a rusoto error into the storage taxonomy.
fn classify<E: StdError + 'static>(err: RusotoError<E>) -> StorageFailure {
    match err {
        RusotoError::Credentials(e) => StorageFailure::MissingCredentials(e.to_string()),
        RusotoError::HttpDispatch(e) => StorageFailure::EndpointUnreachable(e.to_string()),
        RusotoError::Unknown(response) => StorageFailure::Provider(provider_error(
            response.status.as_u16(),
            response.body_as_str(),
        )),
        RusotoError::Service(e) => StorageFailure::Provider(ProviderError {
            code: service_error_code(&e),
            message: e.to_string(),
            request_id: None,
            http_status: None,
        }),
        RusotoError::Validation(msg) => {
            StorageFailure::Other(format!("request rejected before sending: {}", msg))
        }
        RusotoError::ParseError(msg) => {
            StorageFailure::Other(format!("unreadable S3 response: {}", msg))
        }
        RusotoError::Blocking => StorageFailure::Other("blocking S3 call failed".to_string()),
    }
}

/// Provider code of a modeled service error, taken from its variant name
/// (`NoSuchBucket("b")` becomes `NoSuchBucket`).
fn service_error_code<E: StdError>(err: &E) -> String {
    let debug = format!("{:?}", err);
    let code = debug
        .split(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or_default();
    if code.is_empty() {
        "Unknown".to_string()
    } else {
        code.to_string()
    }
}

/// Extract code, message and request id from an S3 XML error body.
fn provider_error(status: u16, body: &str) -> ProviderError {
    ProviderError {
        code: xml_tag(body, "Code").unwrap_or_else(|| "Unknown".to_string()),
        message: xml_tag(body, "Message").unwrap_or_else(|| "Unknown error".to_string()),
        request_id: xml_tag(body, "RequestId"),
        http_status: Some(status),
    }
}

fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// Verified rusoto client bound to one bucket.
struct S3Store {
    client: S3Client,
    bucket: String,
    runtime: Runtime,
}

impl ObjectStore for S3Store {
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, StorageFailure> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let request = ListObjectsV2Request {
                bucket: self.bucket.clone(),
                prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
                continuation_token: continuation_token.take(),
                ..Default::default()
            };

            let output = self
                .runtime
                .block_on(self.client.list_objects_v2(request))
                .map_err(classify)?;

            for object in output.contents.unwrap_or_default() {
                let parsed = object.last_modified.as_deref().and_then(parse_timestamp);
                match (object.key, parsed) {
                    (Some(key), Some(last_modified)) => {
                        objects.push(ObjectDescriptor { key, last_modified })
                    }
                    (key, _) => warn!(
                        "Skipping listed object without usable key or timestamp: {:?}",
                        key
                    ),
                }
            }

            match (output.is_truncated, output.next_continuation_token) {
                (Some(true), Some(token)) => continuation_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} objects under prefix {:?}", objects.len(), prefix);
        Ok(objects)
    }

    fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageFailure> {
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_length: Some(body.len() as i64),
            body: Some(ByteStream::from(body)),
            ..Default::default()
        };

        self.runtime
            .block_on(self.client.put_object(request))
            .map(|_| ())
            .map_err(classify)
    }

    fn delete_object(&self, key: &str) -> Result<(), StorageFailure> {
        let request = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };

        self.runtime
            .block_on(self.client.delete_object(request))
            .map(|_| ())
            .map_err(classify)
    }
}
