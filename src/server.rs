use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::{routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;

use crate::bot::{Bot, Update};
use crate::error::Error;
use crate::sidekick::SidekickClient;
use crate::subscription::SubscriptionManager;

#[derive(Clone)]
pub struct AppState {
    pub bot: Bot,
    pub subscriptions: SubscriptionManager,
    pub sidekick: SidekickClient,
}

pub async fn run(bind: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", bind, port))?;
    log::info!("webhook server listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await
        .context("webhook server exited")
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", routing::post(webhook))
        .route("/api/monitor/add", routing::post(add_monitor))
        .route("/api/monitor/remove", routing::post(remove_monitor))
        .route("/api/monitor/list", routing::get(list_monitored))
        .route("/api/check-status", routing::get(check_status))
        .with_state(state)
}

async fn webhook(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> Result<&'static str, Error> {
    state.bot.handle_update(update).await?;
    Ok("OK")
}

#[derive(Debug, Deserialize)]
struct MonitorRequest {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
    #[serde(rename = "chatId")]
    chat_id: Option<String>,
}

impl MonitorRequest {
    fn require(self) -> Result<(String, String), Error> {
        let room_id = self
            .room_id
            .filter(|s| !s.is_empty())
            .ok_or(Error::InvalidRequest("roomId"))?;
        let chat_id = self
            .chat_id
            .filter(|s| !s.is_empty())
            .ok_or(Error::InvalidRequest("chatId"))?;
        Ok((room_id, chat_id))
    }
}

async fn add_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> Result<Json<Value>, Error> {
    let (room_id, chat_id) = req.require()?;
    let info = state.subscriptions.add(&chat_id, &room_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "monitoring added",
        "roomInfo": info,
    })))
}

async fn remove_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> Result<Json<Value>, Error> {
    let (room_id, chat_id) = req.require()?;
    state.subscriptions.remove(&chat_id, &room_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "monitoring removed",
    })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(rename = "chatId")]
    chat_id: Option<String>,
}

async fn list_monitored(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, Error> {
    let chat_id = query.chat_id.ok_or(Error::InvalidRequest("chatId"))?;
    let rooms = state.subscriptions.list_for_subscriber(&chat_id).await?;
    Ok(Json(json!({ "rooms": rooms })))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

/// Debug passthrough: the raw upstream envelope, no side effects.
async fn check_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, Error> {
    let room_id = query.room_id.ok_or(Error::InvalidRequest("roomId"))?;
    Ok(Json(state.sidekick.raw_status(&room_id).await?))
}
