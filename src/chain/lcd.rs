//! Smart queries against the wager contract through the LCD REST gateway.
//!
//! `GET {lcd}/cosmwasm/wasm/v1/contract/{address}/smart/{base64(query)}`
//! answers `{"data": <contract response>}`.

use crate::chain::{
    ChainError, ConfigResponse, ContractConfig, MatchmakingStatus, QueryMsg, TokenStatusResponse,
    WagerReader, WagerResponse,
};
use crate::wager::{TokenRef, WagerTerms};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct SmartQueryResponse<T> {
    data: T,
}

/// Read-only client for the wager contract.
#[derive(Clone)]
pub struct LcdWagerClient {
    lcd_url: String,
    contract: String,
    http: Client,
}

impl LcdWagerClient {
    pub fn new(lcd_url: String, contract: String, timeout: Duration) -> Result<Self, ChainError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            lcd_url: lcd_url.trim_end_matches('/').to_string(),
            contract,
            http,
        })
    }

    fn smart_query_url(&self, msg: &QueryMsg) -> Result<String, ChainError> {
        let json = serde_json::to_vec(msg).map_err(|e| ChainError::Decode(e.to_string()))?;
        Ok(format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.lcd_url,
            self.contract,
            BASE64.encode(json)
        ))
    }

    async fn smart_query<T: DeserializeOwned>(&self, msg: &QueryMsg) -> Result<T, ChainError> {
        let url = self.smart_query_url(msg)?;
        debug!(query = ?msg, "contract smart query");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Status { status, body });
        }

        let body: SmartQueryResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))?;
        Ok(body.data)
    }
}

#[async_trait]
impl WagerReader for LcdWagerClient {
    async fn wager(&self, token: &TokenRef) -> Result<WagerTerms, ChainError> {
        let resp: WagerResponse = self.smart_query(&QueryMsg::wager(token)).await?;
        WagerTerms::try_from(resp.wager)
    }

    async fn config(&self) -> Result<ContractConfig, ChainError> {
        let resp: ConfigResponse = self.smart_query(&QueryMsg::Config {}).await?;
        ContractConfig::try_from(resp.config)
    }

    async fn token_status(&self, token: &TokenRef) -> Result<MatchmakingStatus, ChainError> {
        let resp: TokenStatusResponse = self.smart_query(&QueryMsg::token_status(token)).await?;
        MatchmakingStatus::try_from(resp.matchmaking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smart_query_url() {
        let client = LcdWagerClient::new(
            "https://rest.example.org/".to_string(),
            "stars1wager".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let url = client.smart_query_url(&QueryMsg::Config {}).unwrap();
        // base64("{\"config\":{}}")
        assert_eq!(
            url,
            "https://rest.example.org/cosmwasm/wasm/v1/contract/stars1wager/smart/eyJjb25maWciOnt9fQ=="
        );
    }
}
