//! Page actions
//!
//! One-round-trip requests the media pages make against their own URL, keyed by
//! a `request_type` form field. Responses that used to be told apart by which
//! keys they carried are parsed into tagged results ([`ActionOutcome`]).

pub mod rating;
pub mod thread;

use crate::backend::{build_http_client, BackendError, Endpoints, CSRF_FIELD};
use crate::config::BackendConfig;
use crate::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

pub use rating::{parse_rating, rating_from_pointer, star_fill_percent};
pub use thread::{CommentNode, CommentThread};

/// Page action errors
#[derive(Error, Debug)]
pub enum PageError {
    #[error("Client setup failed: {0}")]
    Setup(#[from] BackendError),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Server message with its CSS tags (e.g. `error`, `success`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message: String,
    #[serde(default)]
    pub tags: String,
}

/// The message list shown above a form. Each round trip replaces it.
#[derive(Debug, Clone, Default)]
pub struct MessageBoard {
    messages: Vec<Message>,
}

impl MessageBoard {
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// `<li>` items for the message list
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                format!(
                    "<li class=\"{}\">{}</li>",
                    escape_html(&m.tags),
                    escape_html(&m.message)
                )
            })
            .collect()
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Numbers and strings both become display text ("4.5", "4,5")
fn display_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A comment as the server returns it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub rating: i64,
}

/// Result of a comment or report submission
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Created(Comment),
    Reported(String),
    ValidationFailed(Vec<Message>),
}

impl ActionOutcome {
    /// Classify a response body by the key it carries
    pub fn from_value(value: Value) -> Result<Self, PageError> {
        let Value::Object(mut map) = value else {
            return Err(PageError::UnexpectedResponse("expected a JSON object".into()));
        };

        if let Some(comment) = map.remove("comment") {
            let comment = serde_json::from_value(comment)
                .map_err(|e| PageError::UnexpectedResponse(format!("bad comment: {}", e)))?;
            return Ok(ActionOutcome::Created(comment));
        }
        if let Some(message) = map.remove("report_success_message") {
            let message = match message {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(ActionOutcome::Reported(message));
        }
        if let Some(messages) = map.remove("messages") {
            return Ok(ActionOutcome::ValidationFailed(parse_messages(messages)?));
        }

        Err(PageError::UnexpectedResponse(format!(
            "none of comment, report_success_message, messages in {:?}",
            map.keys().collect::<Vec<_>>()
        )))
    }

    fn label(&self) -> &'static str {
        match self {
            ActionOutcome::Created(_) => "created",
            ActionOutcome::Reported(_) => "reported",
            ActionOutcome::ValidationFailed(_) => "validation_failed",
        }
    }
}

fn parse_messages(value: Value) -> Result<Vec<Message>, PageError> {
    serde_json::from_value(value)
        .map_err(|e| PageError::UnexpectedResponse(format!("bad messages: {}", e)))
}

/// Tag attached to a search result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub help_text: String,
}

/// One search hit; `title` is the key the server used
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub rating: String,
    pub tags: Vec<Tag>,
}

#[derive(Deserialize)]
struct SearchResultBody {
    link: String,
    #[serde(default, deserialize_with = "display_string")]
    rating: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

/// Search response: results in server order plus any form messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub messages: Vec<Message>,
}

/// Criteria for the media filter; empty fields are sent blank
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFilter {
    pub title: String,
    pub author: String,
    /// Tag ids, sent comma separated
    pub tags: Vec<String>,
    pub rating_direction: String,
    pub rating_minimum_value: Option<f64>,
    pub rating_maximum_value: Option<f64>,
    pub user_who_added: String,
}

impl MediaFilter {
    fn fields(&self) -> Vec<(&'static str, String)> {
        let number = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        vec![
            ("title", self.title.clone()),
            ("author", self.author.clone()),
            ("tags", self.tags.join(",")),
            ("rating_direction", self.rating_direction.clone()),
            ("rating_minimum_value", number(self.rating_minimum_value)),
            ("rating_maximum_value", number(self.rating_maximum_value)),
            ("user_who_added", self.user_who_added.clone()),
        ]
    }
}

#[derive(Deserialize)]
struct FilterResultBody {
    title: String,
    link: String,
    #[serde(default, deserialize_with = "display_string")]
    rating: String,
    #[serde(default)]
    tags: Vec<Tag>,
}

/// Direction of a comment vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
}

impl Vote {
    fn as_str(self) -> &'static str {
        match self {
            Vote::Up => "up",
            Vote::Down => "down",
        }
    }
}

/// Result of a comment vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Counted { rating: i64 },
    ValidationFailed(Vec<Message>),
}

/// Client for page actions
pub struct PageClient {
    http_client: reqwest::Client,
    endpoints: Endpoints,
    csrf_token: String,
}

impl PageClient {
    pub fn new(config: &BackendConfig) -> Result<Self, PageError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            endpoints: Endpoints::new(&config.base_url, &config.language),
            csrf_token: config.csrf_token.clone(),
        })
    }

    /// POST a form to the page and return the JSON body.
    ///
    /// Error statuses still yield the body when it is JSON carrying
    /// `messages`, so validation failures surface as data.
    async fn post(
        &self,
        page: &str,
        request_type: Option<&str>,
        fields: &[(&str, &str)],
    ) -> Result<Value, PageError> {
        let mut form: Vec<(&str, &str)> = vec![(CSRF_FIELD, self.csrf_token.as_str())];
        if let Some(request_type) = request_type {
            form.push(("request_type", request_type));
        }
        form.extend_from_slice(fields);

        let response = self
            .http_client
            .post(self.endpoints.page(page))
            .form(&form)
            .send()
            .await?;

        read_json(response).await
    }

    /// Load the search form markup
    #[tracing::instrument(name = "page.search_form", skip(self), err)]
    pub async fn search_form(&self, page: &str) -> Result<String, PageError> {
        let response = self
            .http_client
            .get(self.endpoints.page(page))
            .query(&[("request_type", "get_search_media_form")])
            .send()
            .await?;
        let body = read_json(response).await?;

        let html = body
            .get("search_media_form")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PageError::UnexpectedResponse("missing search_media_form".into()))?;

        metrics::record_page_action("get_search_media_form", "ok");
        Ok(html)
    }

    /// Search media by text and tags
    #[tracing::instrument(name = "page.search", skip(self), err)]
    pub async fn search(
        &self,
        page: &str,
        text: &str,
        tags: &[String],
    ) -> Result<SearchOutcome, PageError> {
        let tags = tags.join(",");
        let body = self
            .post(
                page,
                Some("search_media"),
                &[("text", text), ("tags", tags.as_str())],
            )
            .await?;

        let mut outcome = SearchOutcome::default();
        if let Some(Value::Object(results)) = body.get("search_results") {
            for (title, data) in results {
                let data: SearchResultBody = serde_json::from_value(data.clone()).map_err(|e| {
                    PageError::UnexpectedResponse(format!("bad search result '{}': {}", title, e))
                })?;
                outcome.results.push(SearchResult {
                    title: title.clone(),
                    link: data.link,
                    rating: data.rating,
                    tags: data.tags,
                });
            }
        }
        if let Some(messages) = body.get("messages") {
            outcome.messages = parse_messages(messages.clone())?;
        }

        tracing::debug!(
            results = outcome.results.len(),
            messages = outcome.messages.len(),
            "Search finished"
        );
        metrics::record_page_action("search_media", "ok");
        Ok(outcome)
    }

    /// Filter media by title, author, tags, rating bounds and uploader.
    ///
    /// Results come back as a list and keep the server's order.
    pub async fn filter(
        &self,
        page: &str,
        filter: &MediaFilter,
    ) -> Result<SearchOutcome, PageError> {
        let fields = filter.fields();
        let borrowed: Vec<(&str, &str)> =
            fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let body = self.post(page, Some("filter_media"), &borrowed).await?;

        let mut outcome = SearchOutcome::default();
        if let Some(results) = body.get("filter_results") {
            let results: Vec<FilterResultBody> = serde_json::from_value(results.clone())
                .map_err(|e| PageError::UnexpectedResponse(format!("bad filter results: {}", e)))?;
            outcome.results = results
                .into_iter()
                .map(|r| SearchResult {
                    title: r.title,
                    link: r.link,
                    rating: r.rating,
                    tags: r.tags,
                })
                .collect();
        }
        if let Some(messages) = body.get("messages") {
            outcome.messages = parse_messages(messages.clone())?;
        }

        tracing::debug!(results = outcome.results.len(), "Filter finished");
        metrics::record_page_action("filter_media", "ok");
        Ok(outcome)
    }

    /// Rate a media item; returns the new average when the server sends one
    #[tracing::instrument(name = "page.rate_media", skip(self), err)]
    pub async fn rate_media(
        &self,
        page: &str,
        media_id: &str,
        rating: u8,
    ) -> Result<Option<String>, PageError> {
        let rating = rating.clamp(1, 5).to_string();
        let body = self
            .post(
                page,
                Some("update_media_rating"),
                &[("media_id", media_id), ("new_rating", rating.as_str())],
            )
            .await?;

        let result = match body.get("result_rating") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        metrics::record_page_action(
            "update_media_rating",
            if result.is_some() { "ok" } else { "ignored" },
        );
        Ok(result)
    }

    /// Count a download and return the new total
    #[tracing::instrument(name = "page.download", skip(self), err)]
    pub async fn download(&self, page: &str) -> Result<u64, PageError> {
        let body = self.post(page, Some("download_file"), &[]).await?;

        let count = body
            .get("downloads_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| PageError::UnexpectedResponse("missing downloads_number".into()))?;

        metrics::record_page_action("download_file", "ok");
        Ok(count)
    }

    /// Post a comment, or a reply when `parent_id` is set
    #[tracing::instrument(name = "page.comment", skip(self, content), err)]
    pub async fn comment(
        &self,
        page: &str,
        content: &str,
        parent_id: Option<u64>,
    ) -> Result<ActionOutcome, PageError> {
        let parent = parent_id.map(|id| id.to_string());
        let mut fields = vec![("content", content)];
        if let Some(parent) = parent.as_deref() {
            fields.push(("parent_id", parent));
        }

        let outcome = ActionOutcome::from_value(
            self.post(page, Some("create_comment"), &fields).await?,
        )?;
        metrics::record_page_action("create_comment", outcome.label());
        Ok(outcome)
    }

    /// Report a comment to moderators
    #[tracing::instrument(name = "page.report", skip(self, reason), err)]
    pub async fn report(
        &self,
        page: &str,
        comment_id: u64,
        reason: &str,
    ) -> Result<ActionOutcome, PageError> {
        let comment_id = comment_id.to_string();
        let outcome = ActionOutcome::from_value(
            self.post(
                page,
                Some("report_comment"),
                &[("comment_id", comment_id.as_str()), ("reason", reason)],
            )
            .await?,
        )?;
        metrics::record_page_action("report_comment", outcome.label());
        Ok(outcome)
    }

    /// Vote a comment up or down
    #[tracing::instrument(name = "page.vote", skip(self), err)]
    pub async fn vote(
        &self,
        page: &str,
        comment_id: u64,
        vote: Vote,
    ) -> Result<VoteOutcome, PageError> {
        let comment_id = comment_id.to_string();
        let body = self
            .post(
                page,
                Some("vote_comment"),
                &[("comment_id", comment_id.as_str()), ("vote", vote.as_str())],
            )
            .await?;

        if let Some(rating) = body.get("rating").and_then(Value::as_i64) {
            metrics::record_page_action("vote_comment", "counted");
            return Ok(VoteOutcome::Counted { rating });
        }
        if let Some(messages) = body.get("messages") {
            metrics::record_page_action("vote_comment", "validation_failed");
            return Ok(VoteOutcome::ValidationFailed(parse_messages(
                messages.clone(),
            )?));
        }
        Err(PageError::UnexpectedResponse("missing rating".into()))
    }

    /// Ask for the next moderation task; `None` when the queue is empty
    #[tracing::instrument(name = "page.receive_moderator_task", skip(self), err)]
    pub async fn receive_moderator_task(&self, page: &str) -> Result<Option<String>, PageError> {
        let body = self.post(page, None, &[]).await?;

        let task = body
            .get("moderator_task")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        metrics::record_page_action(
            "receive_moderator_task",
            if task.is_some() { "assigned" } else { "empty" },
        );
        Ok(task)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, PageError> {
    let status = response.status();
    let text = response.text().await?;

    let parsed = serde_json::from_str::<Value>(&text);

    if status.is_success() {
        return parsed.map_err(|e| PageError::UnexpectedResponse(format!("invalid JSON: {}", e)));
    }

    match parsed {
        Ok(body) if status.is_client_error() && body.get("messages").is_some() => Ok(body),
        _ => Err(PageError::Status {
            status: status.as_u16(),
            body: text,
        }),
    }
}
