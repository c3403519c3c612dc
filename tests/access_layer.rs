mod common;

use dmchat::backend::{Backend, Collection, Filter, Query};
use dmchat::models::profile::CreateProfileRequest;
use dmchat::services::conversation::get_or_create_conversation;
use dmchat::services::messaging;
use dmchat::services::profile::create_profile;
use dmchat::state::ChatState;
use dmchat::{ChatError, ChatSession};

use common::{backend, next_new_message, profile, scripted_backend, session, tick};

#[tokio::test]
async fn get_or_create_returns_same_id_from_either_side() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    let bob = profile(&backend, "u2", "bob").await;

    let from_alice = session(&backend, &alice)
        .get_or_create_conversation("u2")
        .await
        .unwrap()
        .unwrap();
    let again = session(&backend, &alice)
        .get_or_create_conversation("u2")
        .await
        .unwrap()
        .unwrap();
    let from_bob = session(&backend, &bob)
        .get_or_create_conversation("u1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(from_alice, again);
    assert_eq!(from_alice, from_bob);

    let rows = backend
        .query(Query::table(Collection::Conversations))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user1_id"], "u1");
    assert_eq!(rows[0]["user2_id"], "u2");
}

#[tokio::test]
async fn concurrent_creation_settles_on_one_conversation() {
    let backend = backend().await;
    profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;

    let (a, b) = tokio::join!(
        get_or_create_conversation(backend.as_ref(), "u1", "u2"),
        get_or_create_conversation(backend.as_ref(), "u2", "u1"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.conversation.id, b.conversation.id);
    assert!(!(a.created && b.created));
    let rows = backend
        .query(Query::table(Collection::Conversations))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn get_or_create_rejects_unknown_and_self() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    let session = session(&backend, &alice);

    assert!(matches!(
        session.get_or_create_conversation("ghost").await,
        Err(ChatError::NotFound(_))
    ));
    assert!(matches!(
        session.get_or_create_conversation("u1").await,
        Err(ChatError::Validation(_))
    ));
}

#[tokio::test]
async fn signed_out_session_is_a_no_op() {
    let backend = backend().await;
    profile(&backend, "u1", "alice").await;
    let session = ChatSession::new(backend.clone(), None);

    assert_eq!(session.get_or_create_conversation("u1").await.unwrap(), None);
    assert!(session.send_message("c1", "hello").await.unwrap().is_none());

    session.start().await.unwrap();
    let state = session.snapshot().await;
    assert_eq!(state.users.len(), 1);
    assert!(state.conversations.is_empty());
}

#[tokio::test]
async fn users_list_excludes_current_user() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    profile(&backend, "u3", "carol").await;

    let session = session(&backend, &alice);
    session.fetch_users().await.unwrap();

    let names: Vec<_> = session
        .snapshot()
        .await
        .users
        .into_iter()
        .map(|p| p.username)
        .collect();
    assert_eq!(names, vec!["bob", "carol"]);
}

#[tokio::test]
async fn blank_messages_are_never_persisted() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    let session = session(&backend, &alice);
    let conversation_id = session.get_or_create_conversation("u2").await.unwrap().unwrap();

    for content in ["", "   ", "\n\t "] {
        assert!(session.send_message(&conversation_id, content).await.unwrap().is_none());
    }

    let rows = backend.query(Query::table(Collection::Messages)).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn messages_come_back_in_creation_order_and_trimmed() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    let bob = profile(&backend, "u2", "bob").await;
    let alice_session = session(&backend, &alice);
    let bob_session = session(&backend, &bob);
    let conversation_id = alice_session
        .get_or_create_conversation("u2")
        .await
        .unwrap()
        .unwrap();

    alice_session.send_message(&conversation_id, " one ").await.unwrap();
    tick().await;
    bob_session.send_message(&conversation_id, "two").await.unwrap();
    tick().await;
    alice_session.send_message(&conversation_id, "three").await.unwrap();

    let messages = messaging::list_messages(backend.as_ref(), &conversation_id)
        .await
        .unwrap();
    let contents: Vec<_> = messages.iter().map(|m| m.message.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    assert!(
        messages
            .windows(2)
            .all(|pair| pair[0].message.created_at <= pair[1].message.created_at)
    );
    assert_eq!(messages[1].sender.as_ref().unwrap().username, "bob");
}

#[tokio::test]
async fn sending_bumps_conversation_to_the_top() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    profile(&backend, "u3", "carol").await;
    let session = session(&backend, &alice);

    let with_bob = session.get_or_create_conversation("u2").await.unwrap().unwrap();
    tick().await;
    let with_carol = session.get_or_create_conversation("u3").await.unwrap().unwrap();

    let before = session.snapshot().await.conversations;
    assert_eq!(before[0].id(), with_carol);
    let bob_updated_before = before[1].conversation.updated_at.clone();
    assert_eq!(before[1].other_user.as_ref().unwrap().username, "bob");

    tick().await;
    session.send_message(&with_bob, "hey bob").await.unwrap();

    let after = session.snapshot().await.conversations;
    assert_eq!(after[0].id(), with_bob);
    assert!(after[0].conversation.updated_at > bob_updated_before);
    assert_eq!(after[0].title(), "bob");
}

#[tokio::test]
async fn outsiders_cannot_post_into_a_conversation() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    let mallory = profile(&backend, "u3", "mallory").await;
    let conversation_id = session(&backend, &alice)
        .get_or_create_conversation("u2")
        .await
        .unwrap()
        .unwrap();

    let result = session(&backend, &mallory)
        .send_message(&conversation_id, "let me in")
        .await;
    assert!(matches!(result, Err(ChatError::Forbidden(_))));

    let missing = session(&backend, &alice).send_message("nope", "hi").await;
    assert!(matches!(missing, Err(ChatError::NotFound(_))));
}

#[tokio::test]
async fn first_contact_scenario() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    let bob = profile(&backend, "u2", "bob").await;

    let alice_session = session(&backend, &alice);
    let conversation_id = alice_session
        .get_or_create_conversation("u2")
        .await
        .unwrap()
        .unwrap();
    let sent = alice_session
        .send_message(&conversation_id, "hi")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.sender_id, "u1");

    let bob_session = session(&backend, &bob);
    bob_session.fetch_messages(&conversation_id).await.unwrap();
    let state = bob_session.snapshot().await;

    assert!(!state.loading);
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].message.content, "hi");
    assert_eq!(state.messages[0].sender.as_ref().unwrap().user_id, "u1");
}

#[tokio::test]
async fn history_for_an_inactive_conversation_is_discarded() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    profile(&backend, "u3", "carol").await;
    let mut session = session(&backend, &alice);

    let with_bob = session.get_or_create_conversation("u2").await.unwrap().unwrap();
    let with_carol = session.get_or_create_conversation("u3").await.unwrap().unwrap();
    session.send_message(&with_bob, "for bob").await.unwrap();

    session
        .set_active_conversation(Some(with_carol.clone()))
        .await
        .unwrap();
    session.fetch_messages(&with_bob).await.unwrap();

    let state = session.snapshot().await;
    assert_eq!(state.active_conversation.as_deref(), Some(with_carol.as_str()));
    assert!(state.messages.is_empty());
    assert!(!state.loading);
}

#[tokio::test]
async fn backend_rows_are_filtered_by_conversation() {
    let backend = backend().await;
    let alice = profile(&backend, "u1", "alice").await;
    profile(&backend, "u2", "bob").await;
    profile(&backend, "u3", "carol").await;
    let session = session(&backend, &alice);

    let with_bob = session.get_or_create_conversation("u2").await.unwrap().unwrap();
    let with_carol = session.get_or_create_conversation("u3").await.unwrap().unwrap();
    session.send_message(&with_bob, "b").await.unwrap();
    session.send_message(&with_carol, "c").await.unwrap();

    let rows = backend
        .query(Query::table(Collection::Messages).filter(Filter::eq("conversation_id", with_carol)))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["content"], "c");
}

#[tokio::test]
async fn backend_failure_is_returned_and_last_state_kept() {
    let backend = scripted_backend().await;
    let alice = profile(backend.inner(), "u1", "alice").await;
    profile(backend.inner(), "u2", "bob").await;

    let mut session = ChatSession::new(backend.clone(), Some(alice));
    let mut updates = session.updates();
    session.start().await.unwrap();
    let conversation_id = session.start_chat_with_user("u2").await.unwrap().unwrap();
    session.send_message(&conversation_id, "before").await.unwrap();
    next_new_message(&mut updates).await;
    let before = session.snapshot().await;

    backend.fail(true);
    assert!(matches!(session.fetch_users().await, Err(ChatError::Backend(_))));
    assert!(matches!(
        session.fetch_conversations().await,
        Err(ChatError::Backend(_))
    ));
    assert!(matches!(
        session.fetch_messages(&conversation_id).await,
        Err(ChatError::Backend(_))
    ));
    assert!(matches!(
        session.send_message(&conversation_id, "after").await,
        Err(ChatError::Backend(_))
    ));
    assert!(matches!(
        session.get_or_create_conversation("u2").await,
        Err(ChatError::Backend(_))
    ));

    let after = session.snapshot().await;
    assert!(!after.loading);
    assert_eq!(after.active_conversation, before.active_conversation);
    let user_ids = |state: &ChatState| -> Vec<String> {
        state.users.iter().map(|p| p.user_id.clone()).collect()
    };
    let conversation_ids = |state: &ChatState| -> Vec<String> {
        state.conversations.iter().map(|c| c.id().to_string()).collect()
    };
    let message_ids = |state: &ChatState| -> Vec<String> {
        state.messages.iter().map(|m| m.id().to_string()).collect()
    };
    assert_eq!(user_ids(&after), user_ids(&before));
    assert_eq!(conversation_ids(&after), conversation_ids(&before));
    assert_eq!(message_ids(&after), message_ids(&before));
    assert_eq!(message_ids(&after).len(), 1);

    backend.fail(false);
    session.fetch_messages(&conversation_id).await.unwrap();
    assert_eq!(session.snapshot().await.messages.len(), 1);
}

#[tokio::test]
async fn loading_flag_is_set_while_history_is_pending() {
    let backend = scripted_backend().await;
    let alice = profile(backend.inner(), "u1", "alice").await;
    profile(backend.inner(), "u2", "bob").await;
    let session = ChatSession::new(backend.clone(), Some(alice));
    let conversation_id = session.get_or_create_conversation("u2").await.unwrap().unwrap();

    let release = backend.hold_next_history();
    let (loaded, ()) = tokio::join!(session.fetch_messages(&conversation_id), async {
        backend.history_held().await;
        assert!(session.snapshot().await.loading);
        release.send(()).unwrap();
    });

    loaded.unwrap();
    assert!(!session.snapshot().await.loading);
}

#[tokio::test]
async fn duplicate_profiles_name_the_colliding_field() {
    let backend = backend().await;
    profile(&backend, "u1", "alice").await;

    let taken = create_profile(
        backend.as_ref(),
        CreateProfileRequest {
            user_id: "u2".to_string(),
            username: "alice".to_string(),
            display_name: None,
        },
    )
    .await;
    let Err(ChatError::Validation(msg)) = &taken else {
        panic!("expected a validation error, got {taken:?}");
    };
    assert_eq!(msg, "Username 'alice' is already taken");

    let existing = create_profile(
        backend.as_ref(),
        CreateProfileRequest {
            user_id: "u1".to_string(),
            username: "alice2".to_string(),
            display_name: None,
        },
    )
    .await;
    let Err(ChatError::Validation(msg)) = &existing else {
        panic!("expected a validation error, got {existing:?}");
    };
    assert_eq!(msg, "User u1 already has a profile");
}
