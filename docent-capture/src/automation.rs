use crate::error::Result;
use crate::page::{Extractor, PageSnapshot, WaitPolicy};
use async_trait::async_trait;
use std::time::Duration;

/// Drives a single page: navigation, input primitives and state extraction.
///
/// One session is driven at a time; every method is a cooperative suspension
/// point and implementations are expected to honour the timeouts they are given.
#[async_trait]
pub trait PageAutomation: Send {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<PageSnapshot>;

    async fn reload(&mut self, timeout: Duration) -> Result<PageSnapshot>;

    async fn go_back(&mut self, timeout: Duration) -> Result<PageSnapshot>;

    /// Current page state without navigating
    async fn snapshot(&mut self) -> Result<PageSnapshot>;

    async fn evaluate(&mut self, extractor: Extractor) -> Result<serde_json::Value>;

    async fn click(&mut self, target: &str) -> Result<()>;

    async fn hover(&mut self, target: &str) -> Result<()>;

    async fn scroll(&mut self, delta_y: i32) -> Result<()>;

    async fn move_mouse(&mut self, x: f64, y: f64) -> Result<()>;

    async fn press_key(&mut self, key: &str) -> Result<()>;

    async fn wait_for_ready(&mut self, wait: WaitPolicy, timeout: Duration) -> Result<()>;

    fn current_url(&self) -> Option<String>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}
