use crossbeam::channel::unbounded;
use dippid::backends::udp::UdpTransport;
use dippid::backends::virtual_input::VirtualController;
use dippid::backends::polled::PolledTransport;
use dippid::{Capability, Mapping, Notification, SensorConfig, SensorManager, TransportConfig};
use std::thread;
use std::time::Duration;

#[test]
fn disconnect_unblocks_a_silent_udp_sensor() {
    let manager = SensorManager::new();
    let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap()).unwrap();
    let sensor = manager.attach("silent", Box::new(transport)).unwrap();
    assert_eq!(manager.len(), 1);

    let (done_tx, done_rx) = unbounded();
    let handle = sensor.clone();
    thread::spawn(move || {
        handle.disconnect();
        let _ = done_tx.send(());
    });

    done_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("disconnect returned");
    assert!(!sensor.is_receiving());
    assert!(manager.is_empty());

    sensor.disconnect();
    assert!(manager.is_empty());
}

#[test]
fn manager_connects_from_config_and_shuts_down() {
    let manager = SensorManager::new();
    let config = SensorConfig {
        name: Some("phone".into()),
        transport: TransportConfig::Udp {
            port: 0,
            bind: "127.0.0.1".parse().unwrap(),
        },
    };
    let sensor = manager.connect(&config).unwrap();
    assert_eq!(sensor.name(), "phone");

    let pad = VirtualController::new("virtual:pad");
    let polled = manager
        .attach(
            "pad",
            Box::new(PolledTransport::new(pad.clone(), Duration::from_millis(1))),
        )
        .unwrap();
    assert_eq!(manager.len(), 2);

    manager.shutdown();
    assert!(manager.is_empty());
    assert!(!sensor.is_receiving());
    assert!(!polled.is_receiving());
}

#[test]
fn queued_subscriber_does_not_block_ingestion() {
    let pad = VirtualController::new("virtual:slow");
    pad.release_button(Capability::Button1);
    let manager = SensorManager::new();
    let sensor = manager
        .attach(
            "slow",
            Box::new(PolledTransport::new(pad.clone(), Duration::from_millis(1))),
        )
        .unwrap();

    let (tx, rx) = unbounded();
    let mapping = Mapping::new("slow", [Capability::Button1], move |n: &Notification| {
        thread::sleep(Duration::from_millis(20));
        let _ = tx.send(n.changed);
    })
    .queued(8);
    assert!(sensor.register(mapping));

    for _ in 0..200 {
        if sensor.get_value(Capability::Button1).ok().flatten().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    pad.press_button(Capability::Button1);

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        Capability::Button1
    );
    manager.shutdown();
}
