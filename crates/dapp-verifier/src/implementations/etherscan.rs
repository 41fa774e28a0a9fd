//! Etherscan-compatible verifier.
//!
//! Verification is a two-step exchange: `verifysourcecode` returns a GUID, then
//! `checkverifystatus` is polled until the explorer reports a verdict.

use crate::{VerificationOutcome, VerificationRequest, VerifierError, VerifierInterface};
use async_trait::async_trait;
use dapp_types::SecretString;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Raw explorer API envelope.
#[derive(Debug, Deserialize)]
struct EtherscanResponse {
	status: String,
	#[serde(default)]
	message: String,
	#[serde(default)]
	result: serde_json::Value,
}

impl EtherscanResponse {
	fn result_text(&self) -> String {
		match &self.result {
			serde_json::Value::String(text) => text.clone(),
			other => other.to_string(),
		}
	}
}

/// Client for one explorer API endpoint.
pub struct EtherscanVerifier {
	api_url: String,
	api_key: SecretString,
	client: Client,
	poll_interval: Duration,
	max_status_polls: u32,
}

impl EtherscanVerifier {
	pub fn new(
		api_url: impl Into<String>,
		api_key: SecretString,
		request_timeout: Duration,
		poll_interval: Duration,
		max_status_polls: u32,
	) -> Result<Self, VerifierError> {
		if api_key.is_empty() {
			return Err(VerifierError::Configuration(
				"explorer API key is empty".to_string(),
			));
		}

		let client = Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| VerifierError::Client(e.to_string()))?;

		Ok(Self {
			api_url: api_url.into(),
			api_key,
			client,
			poll_interval,
			max_status_polls: max_status_polls.max(1),
		})
	}

	async fn submit(
		&self,
		request: &VerificationRequest,
		source: &str,
	) -> Result<String, VerificationOutcome> {
		let compiler_version = request.compiler_version.clone().unwrap_or_default();
		let constructor_args = hex::encode(&request.constructor_args);
		let address = request.address.to_string();
		let chain_id = request.chain_id.to_string();

		let response = self
			.client
			.post(&self.api_url)
			.query(&[("chainid", chain_id.as_str())])
			.form(&[
				("apikey", self.api_key.expose_secret()),
				("module", "contract"),
				("action", "verifysourcecode"),
				("contractaddress", address.as_str()),
				("sourceCode", source),
				("codeformat", "solidity-standard-json-input"),
				("contractname", request.contract_path.as_str()),
				("compilerversion", compiler_version.as_str()),
				// Misspelling is part of the explorer API
				("constructorArguements", constructor_args.as_str()),
			])
			.send()
			.await;

		let body = Self::read(response).await?;
		if body.status == "1" {
			return Ok(body.result_text());
		}
		Err(classify_message(&body.result_text(), &body.message))
	}

	async fn poll_status(&self, guid: &str) -> VerificationOutcome {
		for poll in 1..=self.max_status_polls {
			tokio::time::sleep(self.poll_interval).await;

			let response = self
				.client
				.get(&self.api_url)
				.query(&[
					("apikey", self.api_key.expose_secret()),
					("module", "contract"),
					("action", "checkverifystatus"),
					("guid", guid),
				])
				.send()
				.await;

			let body = match Self::read(response).await {
				Ok(body) => body,
				Err(outcome) => return outcome,
			};

			let result = body.result_text();
			if result.to_lowercase().contains("pending in queue") {
				tracing::debug!(guid, poll, "Verification pending in explorer queue");
				continue;
			}
			return classify_message(&result, &body.message);
		}

		VerificationOutcome::TransientError(format!(
			"verification still pending after {} status checks",
			self.max_status_polls
		))
	}

	/// Turns an HTTP exchange into a parsed envelope or an outcome.
	async fn read(
		response: Result<reqwest::Response, reqwest::Error>,
	) -> Result<EtherscanResponse, VerificationOutcome> {
		let response = response
			.map_err(|e| VerificationOutcome::TransientError(format!("request failed: {}", e)))?;

		let status = response.status();
		if status == StatusCode::TOO_MANY_REQUESTS {
			return Err(VerificationOutcome::RateLimited);
		}
		if status.is_server_error() {
			return Err(VerificationOutcome::TransientError(format!(
				"explorer returned {}",
				status
			)));
		}
		if !status.is_success() {
			return Err(VerificationOutcome::PermanentError(format!(
				"explorer returned {}",
				status
			)));
		}

		response.json::<EtherscanResponse>().await.map_err(|e| {
			VerificationOutcome::TransientError(format!("unreadable explorer response: {}", e))
		})
	}
}

/// Maps explorer result text onto an outcome.
///
/// Unknown messages are treated as permanent so a misconfigured key or endpoint
/// does not burn the retry budget.
pub fn classify_message(result: &str, message: &str) -> VerificationOutcome {
	let text = format!("{} {}", result, message).to_lowercase();

	if text.contains("already verified") {
		VerificationOutcome::AlreadyVerified
	} else if text.contains("pass - verified") {
		VerificationOutcome::Verified
	} else if text.contains("rate limit") || text.contains("too many") {
		VerificationOutcome::RateLimited
	} else if text.contains("unable to locate contractcode")
		|| text.contains("pending")
		|| text.contains("try again")
		|| text.contains("timeout")
	{
		VerificationOutcome::TransientError(result.to_string())
	} else {
		VerificationOutcome::PermanentError(if result.is_empty() {
			message.to_string()
		} else {
			result.to_string()
		})
	}
}

#[async_trait]
impl VerifierInterface for EtherscanVerifier {
	async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
		let Some(source) = request.source.as_deref() else {
			return VerificationOutcome::PermanentError(format!(
				"no compiler input available for {}",
				request.contract_path
			));
		};

		let guid = match self.submit(request, source).await {
			Ok(guid) => guid,
			Err(outcome) => return outcome,
		};
		tracing::debug!(contract = %request.contract_name, %guid, "Verification submitted");

		self.poll_status(&guid).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_types::{Address, Bytes};
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	/// Serves one canned HTTP response per incoming connection.
	async fn serve(responses: Vec<(u16, &'static str)>) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();

		tokio::spawn(async move {
			for (status, body) in responses {
				let (mut socket, _) = listener.accept().await.unwrap();
				let mut buf = vec![0u8; 64 * 1024];
				let _ = socket.read(&mut buf).await;
				let reply = format!(
					"HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
					status,
					body.len(),
					body
				);
				socket.write_all(reply.as_bytes()).await.unwrap();
				socket.shutdown().await.ok();
			}
		});

		format!("http://{}/api", addr)
	}

	fn verifier(url: String) -> EtherscanVerifier {
		EtherscanVerifier::new(
			url,
			SecretString::from("KEY"),
			Duration::from_secs(5),
			Duration::from_millis(1),
			3,
		)
		.unwrap()
	}

	fn request(source: Option<&str>) -> VerificationRequest {
		VerificationRequest {
			contract_name: "YourContract".into(),
			address: Address::repeat_byte(0x11),
			chain_id: 11155111,
			contract_path: "contracts/YourContract.sol:YourContract".into(),
			constructor_args: Bytes::from(vec![0u8; 32]),
			compiler_version: Some("v0.8.17+commit.8df45f5f".into()),
			source: source.map(str::to_string),
		}
	}

	#[test]
	fn test_classify_messages() {
		assert_eq!(
			classify_message("Pass - Verified", "OK"),
			VerificationOutcome::Verified
		);
		assert_eq!(
			classify_message("Contract source code already verified", "NOTOK"),
			VerificationOutcome::AlreadyVerified
		);
		assert_eq!(
			classify_message("Max rate limit reached", "NOTOK"),
			VerificationOutcome::RateLimited
		);
		assert!(matches!(
			classify_message("Unable to locate ContractCode at 0x11", "NOTOK"),
			VerificationOutcome::TransientError(_)
		));
		assert!(matches!(
			classify_message("Fail - Unable to verify", "NOTOK"),
			VerificationOutcome::PermanentError(_)
		));
		assert!(matches!(
			classify_message("Invalid API Key", "NOTOK"),
			VerificationOutcome::PermanentError(_)
		));
	}

	#[tokio::test]
	async fn test_submit_then_poll_until_verified() {
		let url = serve(vec![
			(200, r#"{"status":"1","message":"OK","result":"guid-123"}"#),
			(200, r#"{"status":"0","message":"NOTOK","result":"Pending in queue"}"#),
			(200, r#"{"status":"1","message":"OK","result":"Pass - Verified"}"#),
		])
		.await;

		let outcome = verifier(url).verify(&request(Some("{}"))).await;
		assert_eq!(outcome, VerificationOutcome::Verified);
	}

	#[tokio::test]
	async fn test_http_429_is_rate_limited() {
		let url = serve(vec![(429, r#"{"status":"0","message":"NOTOK","result":""}"#)]).await;
		let outcome = verifier(url).verify(&request(Some("{}"))).await;
		assert_eq!(outcome, VerificationOutcome::RateLimited);
	}

	#[tokio::test]
	async fn test_server_error_is_transient() {
		let url = serve(vec![(502, "bad gateway")]).await;
		let outcome = verifier(url).verify(&request(Some("{}"))).await;
		assert!(matches!(outcome, VerificationOutcome::TransientError(_)));
	}

	#[tokio::test]
	async fn test_missing_source_is_permanent() {
		let outcome = verifier("http://127.0.0.1:9/api".into())
			.verify(&request(None))
			.await;
		assert!(matches!(outcome, VerificationOutcome::PermanentError(_)));
	}

	#[test]
	fn test_empty_key_rejected() {
		let result = EtherscanVerifier::new(
			"http://localhost/api",
			SecretString::from(""),
			Duration::from_secs(1),
			Duration::from_secs(1),
			1,
		);
		assert!(matches!(result, Err(VerifierError::Configuration(_))));
	}
}
