// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// OpenAI-compatible chat completions provider (OpenAI, OpenRouter, local gateways)

use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use tokio_util::sync::CancellationToken;

use super::{Completion, CompletionSource, FragmentStream};
use crate::session::Message;
use crate::shell::{ShellError, ShellResult};
use crate::{log_debug, log_info};

/// Check if a model supports the temperature parameter
/// O-series reasoning models don't support temperature
fn supports_temperature(model: &str) -> bool {
	!model.starts_with("o1")
		&& !model.starts_with("o2")
		&& !model.starts_with("o3")
		&& !model.starts_with("o4")
}

/// Widen to f64 through the shortest decimal form, so 0.7 goes out as 0.7
/// and not as 0.699999988079071
fn wire_temperature(temperature: f32) -> f64 {
	temperature
		.to_string()
		.parse()
		.unwrap_or(f64::from(temperature))
}

pub struct OpenAiCompatibleProvider {
	name: String,
	base_url: String,
	api_key: Option<String>,
	stream: bool,
	client: Client,
}

impl OpenAiCompatibleProvider {
	pub fn new(name: &str, base_url: &str, api_key: Option<String>, stream: bool) -> Self {
		Self {
			name: name.to_string(),
			base_url: base_url.trim_end_matches('/').to_string(),
			api_key,
			stream,
			client: Client::new(),
		}
	}

	fn endpoint(&self) -> String {
		format!("{}/chat/completions", self.base_url)
	}

	fn api_key(&self) -> ShellResult<&str> {
		self.api_key
			.as_deref()
			.filter(|key| !key.is_empty())
			.ok_or_else(|| {
				ShellError::completion(format!(
					"{} API key not found. Set it in the config file or the environment",
					self.name
				))
			})
	}

	fn request_body(&self, messages: &[Message], model: &str, temperature: f32) -> serde_json::Value {
		let messages: Vec<serde_json::Value> = messages
			.iter()
			.map(|m| {
				serde_json::json!({
					"role": m.role.as_str(),
					"content": m.content,
				})
			})
			.collect();

		let mut request_body = serde_json::json!({
			"model": model,
			"messages": messages,
			"stream": self.stream,
		});

		// Only add temperature for models that support it
		if supports_temperature(model) {
			request_body["temperature"] = serde_json::json!(wire_temperature(temperature));
		}

		request_body
	}

	async fn complete_whole(
		&self,
		request: reqwest::RequestBuilder,
		cancel: &CancellationToken,
	) -> ShellResult<Completion> {
		let exchange = async {
			let response = request.send().await.map_err(|e| {
				ShellError::completion(format!("{} request failed: {}", self.name, e))
			})?;
			let status = response.status();
			let response_text = response.text().await.map_err(|e| {
				ShellError::completion(format!("{} response could not be read: {}", self.name, e))
			})?;
			Ok::<_, ShellError>((status, response_text))
		};

		let (status, response_text) = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(ShellError::Cancelled),
			result = exchange => result?,
		};

		if !status.is_success() {
			return Err(self.api_error(&format!("HTTP {}", status), &response_text));
		}

		let response_json: serde_json::Value = serde_json::from_str(&response_text).map_err(|e| {
			ShellError::completion(format!(
				"Failed to parse response JSON: {}. Response: {}",
				e, response_text
			))
		})?;

		// Check for errors in response body even with HTTP 200
		if response_json.get("error").is_some() {
			return Err(self.api_error("HTTP 200 but error in response", &response_text));
		}

		let message = response_json
			.get("choices")
			.and_then(|choices| choices.get(0))
			.and_then(|choice| choice.get("message"))
			.ok_or_else(|| {
				ShellError::completion(format!(
					"Invalid response format from {}: {}",
					self.name, response_text
				))
			})?;

		if let Some(reason) = response_json
			.pointer("/choices/0/finish_reason")
			.and_then(|fr| fr.as_str())
		{
			log_debug!("Finish reason: {}", reason);
		}

		let content = message
			.get("content")
			.and_then(|c| c.as_str())
			.unwrap_or_default()
			.to_string();

		Ok(Completion::Message(content))
	}

	async fn complete_streaming(
		&self,
		request: reqwest::RequestBuilder,
		cancel: &CancellationToken,
	) -> ShellResult<Completion> {
		let mut event_source = EventSource::new(request).map_err(|e| {
			ShellError::completion(format!("Failed to create event source: {}", e))
		})?;
		// A dropped connection ends the reply; the session never replays a request
		event_source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

		// Resolve only once the server has accepted the request
		let first = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				event_source.close();
				return Err(ShellError::Cancelled);
			}
			first = event_source.next() => first,
		};

		match first {
			Some(Ok(Event::Open)) => {
				log_debug!("{} stream opened", self.name);
			}
			Some(Ok(Event::Message(message))) => {
				// Some gateways skip the open event; keep the first message
				return Ok(Completion::Stream(fragment_stream(
					self.name.clone(),
					event_source,
					Some(message.data),
				)));
			}
			Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
				return Ok(Completion::Message(String::new()));
			}
			Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
				let error_body = response
					.text()
					.await
					.unwrap_or_else(|_| "Unable to read error body".to_string());
				event_source.close();
				return Err(self.api_error(&format!("HTTP {}", status), &error_body));
			}
			Some(Err(e)) => {
				event_source.close();
				return Err(ShellError::completion(format!(
					"{} stream error: {}",
					self.name, e
				)));
			}
		}

		Ok(Completion::Stream(fragment_stream(
			self.name.clone(),
			event_source,
			None,
		)))
	}

	fn api_error(&self, prefix: &str, body: &str) -> ShellError {
		ShellError::completion(format!("{} API error: {}", self.name, error_details(prefix, body)))
	}
}

#[async_trait::async_trait]
impl CompletionSource for OpenAiCompatibleProvider {
	fn name(&self) -> &str {
		&self.name
	}

	async fn complete(
		&self,
		messages: &[Message],
		model: &str,
		temperature: f32,
		cancel: &CancellationToken,
	) -> ShellResult<Completion> {
		// Check for cancellation before starting
		if cancel.is_cancelled() {
			return Err(ShellError::Cancelled);
		}

		let api_key = self.api_key()?;
		let request_body = self.request_body(messages, model, temperature);

		log_info!(
			"Requesting {} ({} messages) from {}",
			model,
			messages.len(),
			self.name
		);

		let request = self
			.client
			.post(self.endpoint())
			.header("Authorization", format!("Bearer {}", api_key))
			.header("Content-Type", "application/json")
			.json(&request_body);

		if self.stream {
			self.complete_streaming(request, cancel).await
		} else {
			self.complete_whole(request, cancel).await
		}
	}
}

/// Turn the SSE events after `Open` into reply fragments
fn fragment_stream(
	provider: String,
	mut event_source: EventSource,
	first_data: Option<String>,
) -> FragmentStream {
	let stream = async_stream::stream! {
		if let Some(data) = first_data {
			match parse_chunk(&provider, &data) {
				Ok(ChunkOutcome::Done) => {
					event_source.close();
					return;
				}
				Ok(ChunkOutcome::Content(Some(content))) => yield Ok(content),
				Ok(ChunkOutcome::Content(None)) => {}
				Err(e) => {
					event_source.close();
					yield Err(e);
					return;
				}
			}
		}

		while let Some(event) = event_source.next().await {
			match event {
				Ok(Event::Open) => {
					continue;
				}
				Ok(Event::Message(message)) => match parse_chunk(&provider, &message.data) {
					Ok(ChunkOutcome::Done) => break,
					Ok(ChunkOutcome::Content(Some(content))) => yield Ok(content),
					Ok(ChunkOutcome::Content(None)) => {}
					Err(e) => {
						yield Err(e);
						break;
					}
				},
				Err(reqwest_eventsource::Error::StreamEnded) => {
					break;
				}
				Err(e) => {
					yield Err(ShellError::completion(format!("{} stream error: {}", provider, e)));
					break;
				}
			}
		}

		event_source.close();
	};

	Box::pin(stream)
}

enum ChunkOutcome {
	Done,
	Content(Option<String>),
}

fn parse_chunk(provider: &str, data: &str) -> ShellResult<ChunkOutcome> {
	if data.trim() == "[DONE]" {
		return Ok(ChunkOutcome::Done);
	}

	let chunk: serde_json::Value = serde_json::from_str(data).map_err(|e| {
		ShellError::completion(format!("Failed to parse {} stream chunk: {}", provider, e))
	})?;

	if chunk.get("error").is_some() {
		return Err(ShellError::completion(format!(
			"{} API error: {}",
			provider,
			error_details("error in stream", data)
		)));
	}

	let content = chunk
		.pointer("/choices/0/delta/content")
		.and_then(|c| c.as_str())
		.filter(|c| !c.is_empty())
		.map(str::to_string);

	Ok(ChunkOutcome::Content(content))
}

/// Flatten an OpenAI-style error object into one line
fn error_details(prefix: &str, body: &str) -> String {
	let mut error_details = vec![prefix.to_string()];

	if let Some(error_obj) = serde_json::from_str::<serde_json::Value>(body)
		.ok()
		.and_then(|json| json.get("error").cloned())
	{
		if let Some(msg) = error_obj.get("message").and_then(|m| m.as_str()) {
			error_details.push(format!("Message: {}", msg));
		}
		if let Some(code) = error_obj.get("code") {
			if let Some(code) = code.as_str() {
				error_details.push(format!("Code: {}", code));
			} else if code.is_number() {
				error_details.push(format!("Code: {}", code));
			}
		}
		if let Some(type_) = error_obj.get("type").and_then(|t| t.as_str()) {
			error_details.push(format!("Type: {}", type_));
		}
	}

	if error_details.len() == 1 {
		error_details.push(format!("Raw response: {}", body));
	}

	error_details.join(" | ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn conversation() -> Vec<Message> {
		vec![
			Message::system("You are an Ubuntu server."),
			Message::assistant("root@server:~#"),
			Message::user("pwd"),
		]
	}

	fn provider(server: &mockito::Server, stream: bool) -> OpenAiCompatibleProvider {
		OpenAiCompatibleProvider::new("openai", &server.url(), Some("sk-test".to_string()), stream)
	}

	fn sse(chunks: &[&str]) -> String {
		let mut body = String::new();
		for chunk in chunks {
			let event = serde_json::json!({
				"choices": [{ "index": 0, "delta": { "content": chunk } }]
			});
			body.push_str(&format!("data: {}\n\n", event));
		}
		body.push_str("data: [DONE]\n\n");
		body
	}

	async fn collect(completion: Completion) -> Vec<ShellResult<String>> {
		completion.into_stream().collect().await
	}

	#[test]
	fn test_supports_temperature() {
		assert!(supports_temperature("gpt-4o-mini"));
		assert!(!supports_temperature("o3-mini"));
	}

	#[test]
	fn test_request_body_shape() {
		let provider = OpenAiCompatibleProvider::new("openai", "http://localhost/v1/", None, true);
		assert_eq!(provider.endpoint(), "http://localhost/v1/chat/completions");

		let body = provider.request_body(&conversation(), "gpt-4o-mini", 0.0);
		assert_eq!(body["model"], "gpt-4o-mini");
		assert_eq!(body["stream"], true);
		assert_eq!(body["messages"][0]["role"], "system");
		assert_eq!(body["messages"][2]["content"], "pwd");
		assert_eq!(body["temperature"], serde_json::json!(0.0));

		let body = provider.request_body(&conversation(), "gpt-4o-mini", 0.7);
		assert_eq!(body["temperature"].as_f64(), Some(0.7));
		let body = provider.request_body(&conversation(), "gpt-4o-mini", 1.35);
		assert_eq!(body["temperature"].as_f64(), Some(1.35));

		let body = provider.request_body(&conversation(), "o1-mini", 0.7);
		assert!(body.get("temperature").is_none());
	}

	#[test]
	fn test_error_details() {
		let body = r#"{"error":{"message":"Invalid API key","type":"auth_error","code":"invalid_api_key"}}"#;
		assert_eq!(
			error_details("HTTP 401", body),
			"HTTP 401 | Message: Invalid API key | Code: invalid_api_key | Type: auth_error"
		);
		assert_eq!(
			error_details("HTTP 502", "Bad Gateway"),
			"HTTP 502 | Raw response: Bad Gateway"
		);
	}

	#[tokio::test]
	async fn test_streaming_reply_is_forwarded_fragment_by_fragment() {
		let mut server = mockito::Server::new_async().await;
		let mock = server
			.mock("POST", "/chat/completions")
			.match_header("authorization", "Bearer sk-test")
			.with_status(200)
			.with_header("content-type", "text/event-stream")
			.with_body(sse(&["/ro", "ot\nroot@server", ":~#"]))
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let completion = provider(&server, true)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap();
		assert!(matches!(completion, Completion::Stream(_)));

		let fragments: Vec<String> = collect(completion)
			.await
			.into_iter()
			.map(|f| f.unwrap())
			.collect();
		assert_eq!(fragments, vec!["/ro", "ot\nroot@server", ":~#"]);
		mock.assert_async().await;
	}

	#[tokio::test]
	async fn test_streaming_http_error_fails_the_call() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(401)
			.with_header("content-type", "application/json")
			.with_body(r#"{"error":{"message":"Invalid API key"}}"#)
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let err = provider(&server, true)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, ShellError::Completion(_)));
		assert!(err.to_string().contains("Invalid API key"));
	}

	#[tokio::test]
	async fn test_malformed_chunk_ends_stream_with_error() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(200)
			.with_header("content-type", "text/event-stream")
			.with_body(format!(
				"data: {}\n\ndata: not json\n\n",
				serde_json::json!({"choices": [{"delta": {"content": "total 0\n"}}]})
			))
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let completion = provider(&server, true)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap();
		let items = collect(completion).await;
		assert_eq!(items.len(), 2);
		assert_eq!(items[0].as_ref().unwrap(), "total 0\n");
		assert!(matches!(items[1], Err(ShellError::Completion(_))));
	}

	#[tokio::test]
	async fn test_whole_reply_without_streaming() {
		let mut server = mockito::Server::new_async().await;
		let mock = server
			.mock("POST", "/chat/completions")
			.with_status(200)
			.with_header("content-type", "application/json")
			.with_body(
				serde_json::json!({
					"choices": [{
						"message": { "role": "assistant", "content": "/root\nroot@server:~#" },
						"finish_reason": "stop"
					}]
				})
				.to_string(),
			)
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let completion = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap();
		match completion {
			Completion::Message(content) => assert_eq!(content, "/root\nroot@server:~#"),
			other => panic!("expected a whole message, got {:?}", other),
		}
		mock.assert_async().await;
	}

	#[tokio::test]
	async fn test_whole_reply_without_choices_is_an_error() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(200)
			.with_header("content-type", "application/json")
			.with_body(r#"{"choices":[]}"#)
			.expect(1)
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let err = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, ShellError::Completion(_)));
		assert!(err.to_string().contains("Invalid response format"));

		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(200)
			.with_header("content-type", "application/json")
			.with_body("{}")
			.create_async()
			.await;
		let err = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, ShellError::Completion(_)));
	}

	#[tokio::test]
	async fn test_whole_reply_http_error_fails_the_call() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(503)
			.with_header("content-type", "application/json")
			.with_body(r#"{"error":{"message":"Service overloaded","type":"server_error"}}"#)
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let err = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(matches!(err, ShellError::Completion(_)));
		let message = err.to_string();
		assert!(message.contains("HTTP 503"));
		assert!(message.contains("Message: Service overloaded"));
		assert!(message.contains("Type: server_error"));

		// A non-JSON error body is still reported verbatim
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(502)
			.with_body("Bad Gateway")
			.create_async()
			.await;
		let err = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(err.to_string().contains("Raw response: Bad Gateway"));
	}

	#[tokio::test]
	async fn test_error_object_in_successful_response() {
		let mut server = mockito::Server::new_async().await;
		server
			.mock("POST", "/chat/completions")
			.with_status(200)
			.with_body(r#"{"error":{"message":"Rate limited","code":429}}"#)
			.create_async()
			.await;

		let cancel = CancellationToken::new();
		let err = provider(&server, false)
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		let message = err.to_string();
		assert!(message.contains("Rate limited"));
		assert!(message.contains("Code: 429"));
	}

	#[tokio::test]
	async fn test_missing_api_key_and_cancelled_calls() {
		let cancel = CancellationToken::new();
		let provider = OpenAiCompatibleProvider::new("openrouter", "http://127.0.0.1:9", None, true);
		let err = provider
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(err.to_string().contains("openrouter API key"));

		cancel.cancel();
		let err = provider
			.complete(&conversation(), "gpt-4o-mini", 0.0, &cancel)
			.await
			.unwrap_err();
		assert!(err.is_cancelled());
	}
}
