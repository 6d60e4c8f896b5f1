mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_api::chat::history::MessageHistory;
use chat_api::chat::registry::RoomRegistry;
use chat_api::db::store::ChatStore;
use chat_api::error::ChatError;

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn find_room_returns_none_for_unknown_name() {
    let Some((_db, store)) = common::pg_store().await else {
        return;
    };

    let name = common::unique_name("nowhere");
    assert!(store.find_room(&name).await.unwrap().is_none());
}

#[tokio::test]
async fn touch_room_moves_last_activity_forward() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let name = common::unique_name("touch");

    let created = store.create_room(&name).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let touched = store.touch_room(created.id).await.unwrap();

    assert_eq!(touched.id, created.id);
    assert!(touched.last_activity > created.last_activity);
    let found = store.find_room(&name).await.unwrap().unwrap();
    assert_eq!(found.last_activity, touched.last_activity);

    common::cleanup_rooms(&db, &[name.as_str()]).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registry_creates_one_row_under_concurrent_first_access() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let registry = Arc::new(RoomRegistry::new(store.clone()));
    let name = common::unique_name("fresh");

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            let name = name.clone();
            tokio::spawn(async move { registry.get(&name).await.unwrap() })
        })
        .collect();

    let mut rooms = Vec::new();
    for task in tasks {
        rooms.push(task.await.unwrap());
    }

    assert!(rooms.iter().all(|r| Arc::ptr_eq(r, &rooms[0])));
    let row = store.find_room(&name).await.unwrap().unwrap();
    assert_eq!(row.id, rooms[0].id());

    common::cleanup_rooms(&db, &[name.as_str()]).await;
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_room_members_inserts_each_row_at_most_once() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let name = common::unique_name("members");
    let room = store.create_room(&name).await.unwrap();

    assert_eq!(store.add_room_members(room.id, &["u1", "u2"]).await.unwrap(), 2);
    assert_eq!(store.add_room_members(room.id, &["u2", "u1"]).await.unwrap(), 0);
    assert_eq!(store.add_room_members(room.id, &["u1", "u3"]).await.unwrap(), 1);

    common::cleanup_rooms(&db, &[name.as_str()]).await;
}

#[tokio::test]
async fn add_room_members_surfaces_database_errors() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let name = common::unique_name("rollback");
    let room = store.create_room(&name).await.unwrap();
    common::cleanup_rooms(&db, &[name.as_str()]).await;

    // The room row is gone, so the foreign key rejects the inserts.
    assert!(matches!(
        store.add_room_members(room.id, &["u1", "u2"]).await,
        Err(ChatError::Persistence(_))
    ));
}

#[tokio::test]
async fn room_join_persists_both_parties_once() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let registry = RoomRegistry::new(store.clone());
    let name = common::unique_name("pair");
    let alice = common::unique_name("alice");
    let bob = common::unique_name("bob");

    let room = registry.get(&name).await.unwrap();
    let sink = Arc::new(chat_api::chat::sink::ChannelSink::new().0);
    let member = chat_api::chat::room::Member::new("conn_a", &alice, &bob, sink);
    room.join(member.clone()).await.unwrap();
    room.join(member).await.unwrap();

    assert_eq!(room.member_count(), 1);
    for user in [&alice, &bob] {
        let rooms = store.rooms_for_user(user).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, name);
    }

    common::cleanup_rooms(&db, &[name.as_str()]).await;
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_is_ascending_with_sender_images() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let history = MessageHistory::new(store.clone());
    let name = common::unique_name("club");
    let reader = common::unique_name("reader");
    common::seed_user(&db, &reader, Some("https://img.example/reader.png")).await;
    store.create_room(&name).await.unwrap();

    history.record_message(&name, &reader, "first").await.unwrap();
    history.record_message(&name, "ghost", "second").await.unwrap();
    history.record_message(&name, &reader, "third").await.unwrap();

    let messages = history.messages_for_room(&name).await.unwrap();
    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    assert_eq!(
        messages[0].sender_image.as_deref(),
        Some("https://img.example/reader.png")
    );
    assert!(messages[1].sender_image.is_none());

    common::cleanup_rooms(&db, &[name.as_str()]).await;
    common::cleanup_users(&db, &[reader.as_str()]).await;
}

#[tokio::test]
async fn unknown_room_is_not_found_and_nothing_is_inserted() {
    let Some((_db, store)) = common::pg_store().await else {
        return;
    };
    let history = MessageHistory::new(store.clone());
    let name = common::unique_name("missing");

    assert!(matches!(
        history.messages_for_room(&name).await,
        Err(ChatError::RoomNotFound(_))
    ));
    assert!(matches!(
        history.record_message(&name, "u1", "hi").await,
        Err(ChatError::RoomNotFound(_))
    ));
    assert!(store.find_room(&name).await.unwrap().is_none());
}

#[tokio::test]
async fn last_message_per_room_covers_empty_rooms() {
    let Some((db, store)) = common::pg_store().await else {
        return;
    };
    let history = MessageHistory::new(store.clone());
    let me = common::unique_name("me");
    let friend = common::unique_name("friend");
    let stranger = common::unique_name("stranger");
    let talky = common::unique_name("talky");
    let silent = common::unique_name("silent");
    common::seed_user(&db, &friend, Some("friend.png")).await;

    let talky_room = store.create_room(&talky).await.unwrap();
    let silent_room = store.create_room(&silent).await.unwrap();
    store
        .add_room_members(talky_room.id, &[me.as_str(), friend.as_str()])
        .await
        .unwrap();
    store
        .add_room_members(silent_room.id, &[me.as_str(), stranger.as_str()])
        .await
        .unwrap();

    history.record_message(&talky, &me, "first").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    history.record_message(&talky, &friend, "second").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    store.touch_room(talky_room.id).await.unwrap();

    let recent = history.last_message_per_room(&me).await.unwrap();
    assert_eq!(recent.len(), 2);

    assert_eq!(recent[0].room, talky);
    assert_eq!(recent[0].last_message.as_ref().unwrap().text, "second");
    let counterpart = recent[0].counterpart.as_ref().unwrap();
    assert_eq!(counterpart.username, friend);
    assert_eq!(counterpart.image_url.as_deref(), Some("friend.png"));

    assert_eq!(recent[1].room, silent);
    assert!(recent[1].last_message.is_none());
    let counterpart = recent[1].counterpart.as_ref().unwrap();
    assert_eq!(counterpart.username, stranger);
    assert!(counterpart.image_url.is_none());

    common::cleanup_rooms(&db, &[talky.as_str(), silent.as_str()]).await;
    common::cleanup_users(&db, &[friend.as_str()]).await;
}
