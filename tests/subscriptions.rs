#![allow(non_snake_case)]
use serde_json::json;
use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use zombie_house::{
    ContractConfig,
    GameStateClient,
    subscription::SubscriptionState,
    test_helpers::*,
    types::EventFilter,
};

fn contract() -> ContractConfig {
    ContractConfig::new(object_id(0xbf), "0xbf::zpt_coin::ZPT_COIN")
}

#[tokio::test]
async fn subscribe_to_events__forwards_filter_and_stops_on_cancel() {
    // given
    let (events, sender) = FakeEventSource::new_with_sender();
    let client = GameStateClient::new(FakeProvider::new(), events, contract());
    let filter = EventFilter::MoveEventType("0xbf::zombie_house::ZombieBought".to_string());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_copy = seen.clone();
    let handle = client
        .subscribe_to_events(&filter, move |event| {
            seen_copy.lock().unwrap().push(event.parsed_json)
        })
        .await
        .unwrap();

    // when
    sender
        .send(event(
            "0xbf::zombie_house::ZombieBought",
            digest(1),
            json!({ "n": 1 }),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel().await;
    let after_cancel = sender
        .send(event(
            "0xbf::zombie_house::ZombieBought",
            digest(2),
            json!({ "n": 2 }),
        ))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // then
    assert!(after_cancel.is_err());
    assert_eq!(vec![json!({ "n": 1 })], *seen.lock().unwrap());
    assert_eq!(SubscriptionState::Cancelled, handle.state());
}

#[tokio::test]
async fn subscribe_to_events__dropping_handle_stops_delivery() {
    // given
    let (events, sender) = FakeEventSource::new_with_sender();
    let client = GameStateClient::new(FakeProvider::new(), events, contract());
    let calls = Arc::new(Mutex::new(0usize));
    let calls_copy = calls.clone();
    let handle = client
        .subscribe_to_events(&EventFilter::Sender(address(1)), move |_| {
            *calls_copy.lock().unwrap() += 1
        })
        .await
        .unwrap();

    // when
    drop(handle);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = sender
        .send(event("0xbf::zombie_house::ZombieBought", digest(1), json!({})))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // then
    assert_eq!(0, *calls.lock().unwrap());
}

#[tokio::test]
async fn subscribe_to_events__second_subscription_on_fake_fails() {
    let (events, _sender) = FakeEventSource::new_with_sender();
    let client = GameStateClient::new(FakeProvider::new(), events, contract());
    let filter = EventFilter::Package(object_id(0xbf));

    let _first = client.subscribe_to_events(&filter, |_| {}).await.unwrap();
    let second = client.subscribe_to_events(&filter, |_| {}).await;

    assert!(second.is_err());
}
