use std::cell::RefCell;
use std::rc::Rc;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, error, info};
use peer_handshake_protocol::one_to_one::SignalMessage;
use tokio::sync::{mpsc, oneshot, Mutex};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{MessageEvent, WebSocket};

use crate::channel::{decode_message, encode_message, SignalingChannel};

type Incoming = Rc<RefCell<Option<mpsc::UnboundedSender<SignalMessage>>>>;
type Opened = Rc<RefCell<Option<oneshot::Sender<()>>>>;

/// [`SignalingChannel`] over a `WebSocket` connection to a signaling server, JSON text frames.
#[derive(Debug)]
pub struct WebSocketChannel {
    websocket: WebSocket,
    incoming: Mutex<mpsc::UnboundedReceiver<SignalMessage>>,
}

impl WebSocketChannel {
    /// Opens a connection to `signaling_server_url` and waits until it is established.
    ///
    /// # Errors
    /// If the URL is invalid or the connection closes before it opens.
    pub async fn connect(signaling_server_url: &str) -> anyhow::Result<Self> {
        let websocket = WebSocket::new(signaling_server_url).map_err(|err| {
            anyhow!(
                "failed to create connection with signaling server on {}: {:?}",
                signaling_server_url,
                err
            )
        })?;

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let incoming_tx: Incoming = Rc::new(RefCell::new(Some(incoming_tx)));
        let (opened_tx, opened_rx) = oneshot::channel();
        let opened_tx: Opened = Rc::new(RefCell::new(Some(opened_tx)));
        set_websocket_on_open(&websocket, Rc::clone(&opened_tx));
        set_websocket_on_message(&websocket, Rc::clone(&incoming_tx));
        set_websocket_on_close(&websocket, opened_tx, incoming_tx);

        opened_rx.await.map_err(|_closed| {
            anyhow!(
                "signaling server at {} closed the connection",
                signaling_server_url
            )
        })?;
        info!("connected to signaling server at {}", signaling_server_url);

        Ok(Self {
            websocket,
            incoming: Mutex::new(incoming_rx),
        })
    }
}

#[async_trait(?Send)]
impl SignalingChannel for WebSocketChannel {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        let text = encode_message(&message)?;
        self.websocket
            .send_with_str(&text)
            .map_err(|err| anyhow!("failed to send message across the websocket: {:?}", err))
    }

    async fn recv(&self) -> Option<SignalMessage> {
        self.incoming.lock().await.recv().await
    }

    fn is_connected(&self) -> bool {
        self.websocket.ready_state() == WebSocket::OPEN
    }
}

fn set_websocket_on_open(websocket: &WebSocket, opened: Opened) {
    let on_open_callback: Box<dyn FnMut(JsValue)> = Box::new(move |_| {
        let sender = opened.borrow_mut().take();
        if let Some(sender) = sender {
            if sender.send(()).is_err() {
                debug!("nobody is waiting for the websocket to open");
            }
        }
    });
    let on_open_callback = Closure::wrap(on_open_callback);
    websocket.set_onopen(Some(on_open_callback.as_ref().unchecked_ref()));
    on_open_callback.forget();
}

/// handle message sent by signaling server
fn set_websocket_on_message(websocket: &WebSocket, incoming: Incoming) {
    let on_message_callback: Box<dyn FnMut(MessageEvent)> = Box::new(move |ev: MessageEvent| {
        let Some(text) = ev.data().as_string() else {
            error!("signaling message is not a text frame");
            return;
        };
        let message = match decode_message(&text) {
            Ok(message) => message,
            Err(err) => {
                error!("failed to deserialize signaling message: {}", err);
                return;
            }
        };
        if let Some(sender) = incoming.borrow().as_ref() {
            if sender.send(message).is_err() {
                debug!("websocket channel dropped, ignoring message");
            }
        }
    });
    let on_message_callback = Closure::wrap(on_message_callback);
    websocket.set_onmessage(Some(on_message_callback.as_ref().unchecked_ref()));
    on_message_callback.forget();
}

/// ends the stream of incoming messages, or the wait for the connection to open
fn set_websocket_on_close(websocket: &WebSocket, opened: Opened, incoming: Incoming) {
    let on_close_callback: Box<dyn FnMut(JsValue)> = Box::new(move |_| {
        info!("connection to signaling server closed");
        opened.borrow_mut().take();
        incoming.borrow_mut().take();
    });
    let on_close_callback = Closure::wrap(on_close_callback);
    websocket.set_onclose(Some(on_close_callback.as_ref().unchecked_ref()));
    on_close_callback.forget();
}
