#![cfg(feature = "tokio-std")]

use std::time::Duration;

use mutex::raw_impls::cs::CriticalSectionRawMutex;
use tether::{
    Command, PairState, Role,
    address::LinkAddr,
    link::tokio_udp::{UdpLink, new_udp_link, run_udp_link},
    sync_stack::SyncStack,
};
use tokio::{net::UdpSocket, time::sleep};

const CTRL_ADDR: LinkAddr = LinkAddr([0x02, 0, 0, 0, 0, 0x01]);
const TGT_ADDR: LinkAddr = LinkAddr([0x02, 0, 0, 0, 0, 0x02]);

type UdpStack = SyncStack<CriticalSectionRawMutex, UdpLink>;

#[tokio::test]
async fn pair_and_sync_over_udp() {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctrl_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tgt_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    ctrl_sock
        .connect(tgt_sock.local_addr().unwrap())
        .await
        .unwrap();
    tgt_sock
        .connect(ctrl_sock.local_addr().unwrap())
        .await
        .unwrap();

    let (ctrl_link, ctrl_rx) = new_udp_link(CTRL_ADDR);
    let (tgt_link, tgt_rx) = new_udp_link(TGT_ADDR);

    let ctrl: &'static UdpStack =
        Box::leak(Box::new(SyncStack::new_with_link(Role::Controller, ctrl_link)));
    let tgt: &'static UdpStack =
        Box::leak(Box::new(SyncStack::new_with_link(Role::Target, tgt_link)));

    tokio::spawn(run_udp_link(ctrl, ctrl_sock, ctrl_rx));
    tokio::spawn(run_udp_link(tgt, tgt_sock, tgt_rx));

    let cmd = Command {
        main_id: 5,
        sub_id: 1,
        index1: 0,
        index2: 2,
        value: 3.5,
        value_int: -1,
    };
    ctrl.set_command(cmd);
    tgt.update_report(|r| {
        r.set_input(3, true);
        r.data[0] = 0x42;
    });

    // drive both control loops until state has converged (or time out)
    let mut now = 0u64;
    for _ in 0..400 {
        ctrl.tick(now);
        tgt.tick(now);
        sleep(Duration::from_millis(5)).await;
        now += 10;

        if tgt.command() == cmd && ctrl.received_report().input(3) {
            break;
        }
    }

    assert_eq!(ctrl.pair_state(), PairState::Paired);
    assert_eq!(tgt.pair_state(), PairState::Paired);
    assert_eq!(tgt.counterpart(), Some(CTRL_ADDR));

    assert_eq!(tgt.command(), cmd);
    let report = ctrl.received_report();
    assert!(report.input(3));
    assert_eq!(report.data[0], 0x42);
}
