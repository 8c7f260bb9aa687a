//! A sample of the REST endpoint table.
//!
//! Each function only maps named options onto a path, query string and body,
//! and picks the response shape. Lookup-style operations (`get_*`) resolve a
//! 404 to `None`; list, create, push and delete operations surface it as an
//! error.

use crate::client::Requester;
use crate::normalize::{decode_body, decode_not_found};
use crate::pagination::{pagination_from_headers, PaginationList};
use crate::response::ResponseBody;
use crate::{ApiResponse, Error, ErrorDetails, Result};
use http::Method;
use serde::Serialize;
use serde_json::Value;
use urlencoding::encode;

/// Paging options shared by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of items to return.
    pub limit: Option<u64>,
    /// Number of items to skip.
    pub offset: Option<u64>,
    /// Sort newest first.
    pub desc: Option<bool>,
    /// Only return resources owned by the caller (actors and tasks).
    pub my: Option<bool>,
}

/// Export formats for dataset items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatasetFormat {
    /// JSON array.
    #[default]
    Json,
    /// One JSON document per line.
    Jsonl,
    /// Comma-separated values.
    Csv,
    /// Excel workbook.
    Xlsx,
    /// HTML table.
    Html,
    /// XML document.
    Xml,
    /// RSS feed.
    Rss,
}

impl DatasetFormat {
    /// The value of the `format` query parameter.
    pub const fn as_str(self) -> &'static str {
        match self {
            DatasetFormat::Json => "json",
            DatasetFormat::Jsonl => "jsonl",
            DatasetFormat::Csv => "csv",
            DatasetFormat::Xlsx => "xlsx",
            DatasetFormat::Html => "html",
            DatasetFormat::Xml => "xml",
            DatasetFormat::Rss => "rss",
        }
    }
}

/// Options for reading dataset items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetItemsOptions {
    /// Number of items to skip.
    pub offset: Option<u64>,
    /// Maximum number of items to return.
    pub limit: Option<u64>,
    /// Return items newest first.
    pub desc: Option<bool>,
    /// Skip hidden fields and empty items.
    pub clean: Option<bool>,
    /// Only include these fields.
    pub fields: Vec<String>,
    /// Exclude these fields.
    pub omit: Vec<String>,
    /// Field to unwind arrays or objects from.
    pub unwind: Option<String>,
    /// Skip empty items.
    pub skip_empty: Option<bool>,
    /// Skip fields starting with `#`.
    pub skip_hidden: Option<bool>,
    /// Prepend a UTF-8 byte order mark. Defaults to on for CSV, unset otherwise.
    pub bom: Option<bool>,
}

/// A key-value store record.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueRecord {
    /// Record key.
    pub key: String,
    /// Decoded record value.
    pub value: ResponseBody,
    /// Content type the record was stored with.
    pub content_type: Option<String>,
}

fn require(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidParameter(format!(
            "Parameter \"{}\" must be a non-empty string",
            name
        )));
    }
    Ok(())
}

fn items_array(response: ApiResponse) -> Result<Vec<Value>> {
    match response.body.into_json() {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::MalformedBody {
            raw_response: other.to_string(),
            serde_error: "expected a JSON array of items".to_string(),
            status: response.status,
            details: Box::new(ErrorDetails {
                status_code: Some(response.status.as_u16()),
                has_body: true,
                ..Default::default()
            }),
        }),
    }
}

impl Requester {
    /// Lists actors. `GET /v2/acts`
    pub async fn list_actors(&self, options: &ListOptions) -> Result<PaginationList<Value>> {
        let mut call = self.request(Method::GET, "/v2/acts");
        call.query
            .push_opt("limit", options.limit)
            .push_opt("offset", options.offset)
            .push_bool("desc", options.desc)
            .push_bool("my", options.my);

        self.execute(call).await?.into_typed()
    }

    /// Fetches one actor by ID or `username~name`. `GET /v2/acts/{id}`
    pub async fn get_actor(&self, actor_id: &str) -> Result<Option<Value>> {
        require("actorId", actor_id)?;
        let call = self.request(Method::GET, format!("/v2/acts/{}", encode(actor_id)));
        decode_not_found(self.execute(call).await.map(ApiResponse::into_data))
    }

    /// Creates an actor. `POST /v2/acts`
    pub async fn create_actor<B: Serialize>(&self, actor: &B) -> Result<Value> {
        let call = self.request(Method::POST, "/v2/acts").with_json_body(actor)?;
        Ok(self.execute(call).await?.into_data())
    }

    /// Deletes an actor. `DELETE /v2/acts/{id}`
    pub async fn delete_actor(&self, actor_id: &str) -> Result<()> {
        require("actorId", actor_id)?;
        let call = self.request(Method::DELETE, format!("/v2/acts/{}", encode(actor_id)));
        self.execute(call).await?;
        Ok(())
    }

    /// Reads dataset items as JSON, with paging taken from the response
    /// headers. `GET /v2/datasets/{id}/items`
    pub async fn list_items(
        &self,
        dataset_id: &str,
        options: &DatasetItemsOptions,
    ) -> Result<PaginationList<Value>> {
        require("datasetId", dataset_id)?;
        let call = self.items_call(dataset_id, DatasetFormat::Json, options);
        let response = self.execute(call).await?;
        let meta = pagination_from_headers(&response.headers);
        Ok(PaginationList::from_parts(meta, items_array(response)?))
    }

    /// Downloads dataset items in `format`, decoded by content type.
    /// `GET /v2/datasets/{id}/items`
    pub async fn download_items(
        &self,
        dataset_id: &str,
        format: DatasetFormat,
        options: &DatasetItemsOptions,
    ) -> Result<ResponseBody> {
        require("datasetId", dataset_id)?;
        let call = self
            .items_call(dataset_id, format, options)
            .with_json(false);
        let response = self.execute(call).await?;
        decode_response(response)
    }

    fn items_call(
        &self,
        dataset_id: &str,
        format: DatasetFormat,
        options: &DatasetItemsOptions,
    ) -> crate::CallOptions {
        let bom = options
            .bom
            .or((format == DatasetFormat::Csv).then_some(true));

        let mut call = self.request(
            Method::GET,
            format!("/v2/datasets/{}/items", encode(dataset_id)),
        );
        call.query
            .push("format", format.as_str())
            .push_opt("offset", options.offset)
            .push_opt("limit", options.limit)
            .push_bool("desc", options.desc)
            .push_bool("clean", options.clean)
            .push_list("fields", &options.fields)
            .push_list("omit", &options.omit)
            .push_opt("unwind", options.unwind.as_deref())
            .push_bool("skipEmpty", options.skip_empty)
            .push_bool("skipHidden", options.skip_hidden)
            .push_bool("bom", bom);
        call
    }

    /// Appends items to a dataset. `POST /v2/datasets/{id}/items`
    pub async fn push_items<B: Serialize>(&self, dataset_id: &str, items: &B) -> Result<()> {
        require("datasetId", dataset_id)?;
        let call = self
            .request(
                Method::POST,
                format!("/v2/datasets/{}/items", encode(dataset_id)),
            )
            .with_json_body(items)?;
        self.execute(call).await?;
        Ok(())
    }

    /// Fetches a key-value store record.
    /// `GET /v2/key-value-stores/{id}/records/{key}`
    pub async fn get_record(&self, store_id: &str, key: &str) -> Result<Option<KeyValueRecord>> {
        require("storeId", store_id)?;
        require("key", key)?;
        let call = self
            .request(
                Method::GET,
                format!(
                    "/v2/key-value-stores/{}/records/{}",
                    encode(store_id),
                    encode(key)
                ),
            )
            .with_json(false);

        let response = match decode_not_found(self.execute(call).await)? {
            Some(response) => response,
            None => return Ok(None),
        };
        let content_type = response.content_type().map(str::to_string);
        Ok(Some(KeyValueRecord {
            key: key.to_string(),
            value: decode_response(response)?,
            content_type,
        }))
    }

    /// Stores a key-value store record.
    /// `PUT /v2/key-value-stores/{id}/records/{key}`
    pub async fn set_record(
        &self,
        store_id: &str,
        key: &str,
        value: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        require("storeId", store_id)?;
        require("key", key)?;
        require("contentType", content_type)?;
        let call = self
            .request(
                Method::PUT,
                format!(
                    "/v2/key-value-stores/{}/records/{}",
                    encode(store_id),
                    encode(key)
                ),
            )
            .with_raw_body(value, content_type)
            .with_json(false);
        self.execute(call).await?;
        Ok(())
    }

    /// Fetches the log of a build or run as text. `GET /v2/logs/{id}`
    pub async fn get_log(&self, build_or_run_id: &str) -> Result<Option<String>> {
        require("buildOrRunId", build_or_run_id)?;
        let call = self
            .request(Method::GET, format!("/v2/logs/{}", encode(build_or_run_id)))
            .with_json(false);

        let response = match decode_not_found(self.execute(call).await)? {
            Some(response) => response,
            None => return Ok(None),
        };
        Ok(Some(
            String::from_utf8_lossy(&response.body.into_bytes()).into_owned(),
        ))
    }

    /// Fetches a user's public profile, or the caller's own account when
    /// `user_id` is `None`. `GET /v2/users/{id}`
    pub async fn get_user(&self, user_id: Option<&str>) -> Result<Option<Value>> {
        let user_id = user_id.unwrap_or("me");
        require("userId", user_id)?;
        let call = self.request(Method::GET, format!("/v2/users/{}", encode(user_id)));
        decode_not_found(self.execute(call).await.map(ApiResponse::into_data))
    }
}

fn decode_response(response: ApiResponse) -> Result<ResponseBody> {
    let status = response.status;
    let content_type = response.content_type().map(str::to_string);
    let bytes = response.body.into_bytes();
    decode_body(bytes.clone(), content_type.as_deref()).map_err(|e| Error::MalformedBody {
        raw_response: String::from_utf8_lossy(&bytes).into_owned(),
        serde_error: e.to_string(),
        status,
        details: Box::new(ErrorDetails {
            status_code: Some(status.as_u16()),
            has_body: true,
            ..Default::default()
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names() {
        assert_eq!(DatasetFormat::default().as_str(), "json");
        assert_eq!(DatasetFormat::Csv.as_str(), "csv");
        assert_eq!(DatasetFormat::Jsonl.as_str(), "jsonl");
    }

    #[test]
    fn require_rejects_blank() {
        assert!(require("actorId", " ").is_err());
        assert!(require("actorId", "abc").is_ok());
    }
}
