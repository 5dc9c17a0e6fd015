use crate::config::WsConfig;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;
use crate::websocket::{ChannelHandle, ChannelId, ChatGateway, ClientSession};
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// Serialized server event bound for the socket
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundFrame(String);

// WebSocket Actor
struct WsSession {
    user_id: Uuid,
    channel_id: ChannelId,
    gateway: Arc<ChatGateway>,
    // frames for the session worker; dropped on stop
    inbound: Option<UnboundedSender<String>>,
    outbound: Option<UnboundedReceiver<String>>,
    ws: WsConfig,
    hb: Instant,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.ws.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.ws.client_timeout {
                tracing::warn!(user_id = %act.user_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    // Bridge the outbound channel to the actor so frames are written in order
    fn forward_outbound(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(mut rx) = self.outbound.take() else {
            return;
        };
        let addr = ctx.address();
        actix::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if !addr.connected() {
                    break;
                }
                addr.do_send(OutboundFrame(frame));
            }
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.forward_outbound(ctx);
        tracing::debug!(user_id = %self.user_id, channel_id = %self.channel_id, "WebSocket session started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Closing the queue lets the worker drain and close the session;
        // presence is released right away so the user reads as offline now.
        self.inbound.take();

        let gateway = self.gateway.clone();
        let user_id = self.user_id;
        let channel_id = self.channel_id;
        actix::spawn(async move {
            gateway.disconnect(user_id, channel_id).await;
        });
        tracing::debug!(user_id = %self.user_id, channel_id = %self.channel_id, "WebSocket session stopped");
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.hb = Instant::now();
                let queued = self
                    .inbound
                    .as_ref()
                    .map(|tx| tx.send(text.to_string()).is_ok())
                    .unwrap_or(false);
                if !queued {
                    tracing::warn!(user_id = %self.user_id, "session worker gone, closing");
                    ctx.stop();
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, "WebSocket protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&req).map(str::to_string));

    // Reject bad upgrades before anything touches presence
    ws::handshake(&req)?;

    let (channel, outbound) = ChannelHandle::open();
    let channel_id = channel.id();
    let mut session = ClientSession::new(state.gateway.clone(), channel);

    let user_id = session.authenticate(token.as_deref()).await?;

    let (inbound, _worker) = session.spawn_worker();

    let actor = WsSession {
        user_id,
        channel_id,
        gateway: state.gateway.clone(),
        inbound: Some(inbound),
        outbound: Some(outbound),
        ws: state.config.ws.clone(),
        hb: Instant::now(),
    };

    match ws::start(actor, &req, stream) {
        Ok(resp) => Ok(resp),
        Err(e) => {
            state.gateway.disconnect(user_id, channel_id).await;
            Err(e)
        }
    }
}
