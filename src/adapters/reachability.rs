//! Live reachability check over navigation targets.
//!
//! Only `navigate` nodes are checked. A node is dropped when its URL cannot be
//! connected to or answers 404/410; timeouts and other statuses are
//! inconclusive and the node stays.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{IrAction, IrNode};

use super::ReachabilityCheck;

/// A navigate node removed by the check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableNode {
    /// Position in the IR sequence before filtering
    pub position: usize,

    /// Recorded step the node came from, when known
    #[serde(default)]
    pub step_index: Option<usize>,
    pub url: String,
    pub reason: String,
}

/// Outcome of one check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityReport {
    /// Distinct URLs probed
    pub checked_urls: usize,
    pub dropped: Vec<UnreachableNode>,

    /// URLs whose probe was inconclusive
    pub inconclusive: Vec<String>,
}

enum Verdict {
    Reachable,
    Unreachable(String),
    Inconclusive(String),
}

/// HTTP probe: HEAD first, GET when HEAD is refused
pub struct HttpReachability {
    client: Client,
}

impl HttpReachability {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn probe(&self, url: &str) -> Verdict {
        let head = self.client.head(url).send().await;
        let status = match head {
            Ok(response)
                if matches!(
                    response.status(),
                    StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                ) =>
            {
                match self.client.get(url).send().await {
                    Ok(response) => response.status(),
                    Err(e) => return classify_error(&e),
                }
            }
            Ok(response) => response.status(),
            Err(e) => return classify_error(&e),
        };

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            Verdict::Unreachable(format!("HTTP {}", status.as_u16()))
        } else {
            Verdict::Reachable
        }
    }
}

fn classify_error(error: &reqwest::Error) -> Verdict {
    if error.is_timeout() {
        Verdict::Inconclusive(format!("timed out: {error}"))
    } else if error.is_connect() || error.is_builder() {
        Verdict::Unreachable(error.to_string())
    } else {
        Verdict::Inconclusive(error.to_string())
    }
}

#[async_trait]
impl ReachabilityCheck for HttpReachability {
    fn name(&self) -> &str {
        "http"
    }

    async fn check(&self, nodes: Vec<IrNode>) -> Result<(Vec<IrNode>, ReachabilityReport)> {
        let mut report = ReachabilityReport::default();
        let mut verdicts: HashMap<String, Option<String>> = HashMap::new();
        let mut kept = Vec::with_capacity(nodes.len());

        for (position, node) in nodes.into_iter().enumerate() {
            let url = match (node.action, node.url()) {
                (IrAction::Navigate, Some(url)) => url.to_string(),
                _ => {
                    kept.push(node);
                    continue;
                }
            };

            if !verdicts.contains_key(&url) {
                report.checked_urls += 1;
                let verdict = match self.probe(&url).await {
                    Verdict::Reachable => None,
                    Verdict::Unreachable(reason) => Some(reason),
                    Verdict::Inconclusive(reason) => {
                        debug!(%url, %reason, "Reachability inconclusive");
                        report.inconclusive.push(url.clone());
                        None
                    }
                };
                verdicts.insert(url.clone(), verdict);
            }

            match verdicts.get(&url).cloned().flatten() {
                Some(reason) => {
                    warn!(position, %url, %reason, "Dropping unreachable navigation");
                    report.dropped.push(UnreachableNode {
                        position,
                        step_index: node.step_index,
                        url,
                        reason,
                    });
                }
                None => kept.push(node),
            }
        }

        info!(
            checked = report.checked_urls,
            dropped = report.dropped.len(),
            "Reachability check complete"
        );

        Ok((kept, report))
    }
}
