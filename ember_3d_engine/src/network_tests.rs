use super::*;
use std::cell::RefCell;
use std::rc::Rc;
use crate::callback::{CallbackMessage, CallbackSink};
use crate::error::Error;

#[derive(Default)]
struct LoopbackState {
    pending: Vec<NetworkEvent>,
    sent: Vec<Vec<u8>>,
    pumps: u32,
    stall: Duration,
}

/// Transport whose queue is filled by the test
#[derive(Clone, Default)]
struct LoopbackTransport {
    state: Rc<RefCell<LoopbackState>>,
}

impl NetworkTransport for LoopbackTransport {
    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.state.borrow_mut().sent.push(data.to_vec());
        Ok(())
    }

    fn pump_events(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.pumps += 1;
        if !state.stall.is_zero() {
            std::thread::sleep(state.stall);
        }
        Ok(())
    }

    fn run_callbacks(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.state.borrow_mut().pending)
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    messages: Rc<RefCell<Vec<CallbackMessage>>>,
}

impl CallbackSink for RecordingSink {
    fn dispatch(&mut self, message: CallbackMessage) {
        self.messages.borrow_mut().push(message);
    }
}

struct Fixture {
    transport: LoopbackTransport,
    sink: RecordingSink,
    callbacks: CallbackRegistry,
    pump: NetworkPump,
}

fn fixture() -> Fixture {
    let transport = LoopbackTransport::default();
    let sink = RecordingSink::default();
    let mut callbacks = CallbackRegistry::new(Box::new(sink.clone()));
    let status = ManagedCallback::new(callbacks.register("on_status"));
    let message = ManagedCallback::new(callbacks.register("on_message"));
    let pump = NetworkPump::new(Box::new(transport.clone()))
        .with_status_callback(status)
        .with_message_callback(message);
    Fixture { transport, sink, callbacks, pump }
}

#[test]
fn test_status_change_forwarded_once() {
    let mut f = fixture();
    f.transport.state.borrow_mut().pending = vec![
        NetworkEvent::StatusChanged(ConnectionStatus::Connected),
        NetworkEvent::StatusChanged(ConnectionStatus::Connected),
    ];

    assert_eq!(f.pump.pump(&mut f.callbacks).unwrap(), 2);

    assert!(f.pump.is_connected());
    let messages = f.sink.messages.borrow();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].name, "on_status");
    assert_eq!(messages[0].arg, Some(CallbackArg::Text("connected".to_string())));
}

#[test]
fn test_messages_forwarded_as_bytes() {
    let mut f = fixture();
    f.transport.state.borrow_mut().pending = vec![NetworkEvent::Message(vec![7, 8, 9])];

    f.pump.pump(&mut f.callbacks).unwrap();

    let messages = f.sink.messages.borrow();
    assert_eq!(messages[0].name, "on_message");
    assert_eq!(messages[0].arg, Some(CallbackArg::Bytes(vec![7, 8, 9])));
}

#[test]
fn test_send_requires_connection() {
    let mut f = fixture();
    assert!(!f.pump.send(b"early").unwrap());

    f.transport.state.borrow_mut().pending = vec![NetworkEvent::StatusChanged(ConnectionStatus::Connected)];
    f.pump.pump(&mut f.callbacks).unwrap();
    assert!(f.pump.send(b"hello").unwrap());

    f.transport.state.borrow_mut().pending =
        vec![NetworkEvent::StatusChanged(ConnectionStatus::Disconnected("peer closed".to_string()))];
    f.pump.pump(&mut f.callbacks).unwrap();
    assert!(!f.pump.send(b"late").unwrap());

    assert_eq!(f.transport.state.borrow().sent, vec![b"hello".to_vec()]);
}

#[test]
fn test_pump_timing_recorded() {
    let mut f = fixture();
    f.pump = NetworkPump::new(Box::new(f.transport.clone())).with_frame_budget(Duration::from_millis(1));
    f.transport.state.borrow_mut().stall = Duration::from_millis(5);

    assert_eq!(f.pump.pump(&mut f.callbacks).unwrap(), 0);

    assert!(f.pump.last_pump_duration() >= Duration::from_millis(5));
    assert_eq!(f.transport.state.borrow().pumps, 1);
}

struct FailingTransport;

impl NetworkTransport for FailingTransport {
    fn send_data(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::BackendError("socket closed".to_string()))
    }

    fn pump_events(&mut self) -> Result<()> {
        Err(Error::BackendError("socket closed".to_string()))
    }

    fn run_callbacks(&mut self) -> Vec<NetworkEvent> {
        Vec::new()
    }
}

#[test]
fn test_transport_errors_propagate() {
    let mut callbacks = CallbackRegistry::new(Box::new(RecordingSink::default()));
    let mut pump = NetworkPump::new(Box::new(FailingTransport));

    assert!(pump.pump(&mut callbacks).is_err());
    assert_eq!(*pump.status(), ConnectionStatus::Connecting);
}
