use std::sync::Arc;

use remark_mock_server::{MockServer, MockStore};

use crate::{
    api::{self, CommentId, NewComment, PostId, Uuid, UserId},
    channel, Command, Config, Error, PostFeed, Scope, Session, Update,
};

fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }
}

fn user(n: u128) -> UserId {
    UserId(Uuid::from_u128(n))
}

const ME: u128 = 1;

struct Fixture {
    store: MockStore,
    post: PostId,
    page_size: usize,
}

impl Fixture {
    async fn new(page_size: usize) -> Fixture {
        init_tracing();
        let mut server = MockServer::new(page_size);
        let post = server
            .admin_create_post(user(ME), String::from("a post"))
            .expect("creating post");
        Fixture {
            store: MockStore::new(server),
            post: post.id,
            page_size,
        }
    }

    async fn add(&self, parent: Option<CommentId>, author: u128, contents: &str) -> api::Comment {
        self.store
            .server()
            .await
            .create(NewComment {
                post_id: self.post,
                parent_id: parent,
                author: user(author),
                mention: None,
                contents: String::from(contents),
            })
            .expect("creating comment")
    }

    async fn add_many(&self, parent: Option<CommentId>, n: usize) -> Vec<CommentId> {
        let mut res = Vec::new();
        for i in 0..n {
            res.push(self.add(parent, 2, &format!("comment {i}")).await.id);
        }
        res
    }

    fn session(&self) -> Session<MockStore> {
        Session::new(
            Arc::new(self.store.clone()),
            Config::with_page_size(self.page_size),
            self.post,
            user(ME),
        )
    }
}

fn top_level_ids(s: &Session<MockStore>) -> Vec<CommentId> {
    s.snapshot().comments().iter().map(|c| c.id).collect()
}

fn reply_ids(s: &Session<MockStore>, parent: CommentId) -> Vec<CommentId> {
    s.snapshot()
        .get(&parent)
        .expect("parent is loaded")
        .reply_window
        .iter()
        .map(|c| c.id)
        .collect()
}

#[tokio::test]
async fn pages_until_a_short_page() {
    let f = Fixture::new(3).await;
    let ids = f.add_many(None, 7).await;
    let mut s = f.session();

    s.load().await.unwrap();
    assert_eq!(top_level_ids(&s), ids[..3].to_vec());
    assert!(!s.status(Scope::TopLevel).unwrap().no_more);

    s.fetch_more(Scope::TopLevel).await.unwrap();
    assert_eq!(top_level_ids(&s), ids[..6].to_vec());

    s.fetch_more(Scope::TopLevel).await.unwrap();
    assert_eq!(top_level_ids(&s), ids);
    let status = s.status(Scope::TopLevel).unwrap();
    assert!(status.no_more);
    assert_eq!(status.offset, 1);

    assert!(s.request_more(Scope::TopLevel).is_none());
}

#[tokio::test]
async fn full_last_page_needs_an_empty_page_to_end() {
    let f = Fixture::new(3).await;
    let ids = f.add_many(None, 6).await;
    let mut s = f.session();

    s.load().await.unwrap();
    s.fetch_more(Scope::TopLevel).await.unwrap();
    assert_eq!(top_level_ids(&s), ids);
    assert!(!s.status(Scope::TopLevel).unwrap().no_more);

    s.fetch_more(Scope::TopLevel).await.unwrap();
    assert_eq!(top_level_ids(&s), ids);
    assert!(s.status(Scope::TopLevel).unwrap().no_more);
}

#[tokio::test]
async fn shared_keys_across_pages_are_neither_skipped_nor_repeated() {
    let f = Fixture::new(2).await;
    f.store.server().await.freeze_clock();
    let mut ids = f.add_many(None, 3).await;
    f.store.server().await.unfreeze_clock();
    ids.extend(f.add_many(None, 1).await);
    let mut s = f.session();

    s.load().await.unwrap();
    let status = s.status(Scope::TopLevel).unwrap();
    assert_eq!(status.offset, 2);

    s.fetch_more(Scope::TopLevel).await.unwrap();
    assert_eq!(top_level_ids(&s), ids);
}

#[tokio::test]
async fn created_comment_is_fetched_back() {
    let f = Fixture::new(10).await;
    let mut s = f.session();
    s.load().await.unwrap();
    assert!(s.snapshot().comments().is_empty());

    s.comment(String::from("hello")).await.unwrap();
    let comments = s.snapshot().comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].contents, "hello");
    assert_eq!(comments[0].author, user(ME));
}

#[tokio::test]
async fn creating_pulls_in_the_successors_of_a_partial_listing() {
    let f = Fixture::new(2).await;
    let mut ids = f.add_many(None, 3).await;
    let mut s = f.session();
    s.load().await.unwrap();

    s.comment(String::from("new")).await.unwrap();
    let new = s.snapshot().comments()[3].clone();
    assert_eq!(new.contents, "new");
    ids.push(new.id);
    assert_eq!(top_level_ids(&s), ids);
}

#[tokio::test]
async fn invalid_contents_are_never_sent() {
    let f = Fixture::new(10).await;
    let mut s = f.session();
    assert!(matches!(
        s.comment(String::from(" \n ")).await,
        Err(Error::Api(api::Error::EmptyContents))
    ));
    assert!(matches!(
        s.comment(String::from("a\0b")).await,
        Err(Error::Api(api::Error::NullByteInString(_)))
    ));
    assert_eq!(f.store.server().await.test_num_comments(), 0);
}

#[tokio::test]
async fn replies_load_on_open_and_mention_the_replied_author() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let theirs = f.add(Some(top.id), 3, "their reply").await;
    let mine = f.add(Some(top.id), ME, "my reply").await;
    let mut s = f.session();
    s.load().await.unwrap();

    let loaded = s.snapshot().get(&top.id).unwrap().clone();
    assert!(loaded.reply_window.is_empty());
    assert_eq!(loaded.reply_total_count, 2);
    assert!(loaded.has_unloaded_replies());

    s.open_replies(top.id).await.unwrap();
    assert_eq!(reply_ids(&s, top.id), vec![theirs.id, mine.id]);
    // Opening again does not fetch anything
    assert!(s.request_replies(top.id).unwrap().is_none());

    s.reply(theirs.id, String::from("to them")).await.unwrap();
    s.reply(mine.id, String::from("to me")).await.unwrap();
    s.reply(top.id, String::from("to top")).await.unwrap();

    let parent = s.snapshot().get(&top.id).unwrap().clone();
    assert_eq!(parent.reply_window.len(), 5);
    assert_eq!(parent.reply_total_count, 5);
    let new = &parent.reply_window[2..];
    assert_eq!(new[0].contents, "to them");
    assert_eq!(new[0].mention, Some(user(3)));
    assert_eq!(new[1].mention, None);
    assert_eq!(new[2].mention, None);
    assert!(new.iter().all(|r| r.parent_id == Some(top.id)));
    assert_eq!(s.snapshot().comments().len(), 1);
}

#[tokio::test]
async fn replies_are_not_fetched_when_there_are_none() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let mut s = f.session();
    s.load().await.unwrap();

    assert!(s.request_replies(top.id).unwrap().is_none());
    let unknown = CommentId(Uuid::from_u128(42));
    assert!(matches!(
        s.request_replies(unknown),
        Err(Error::UnknownTarget(id)) if id == unknown
    ));
}

#[tokio::test]
async fn edit_only_changes_contents() {
    let f = Fixture::new(10).await;
    let ids = f.add_many(None, 2).await;
    let mut s = f.session();
    s.load().await.unwrap();
    let before = s.snapshot().clone();

    s.edit(ids[0], String::from("edited")).await.unwrap();
    let after = s.snapshot();
    assert_eq!(top_level_ids(&s), ids);
    assert_eq!(after.comments()[0].contents, "edited");
    assert_eq!(
        after.comments()[0].ordering_key,
        before.comments()[0].ordering_key
    );
    assert_eq!(after.comments()[1], before.comments()[1]);
    assert_eq!(before.comments()[0].contents, "comment 0");
}

#[tokio::test]
async fn edit_of_a_reply_keeps_counts() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let replies = f.add_many(Some(top.id), 2).await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(top.id).await.unwrap();

    s.edit(replies[1], String::from("edited reply")).await.unwrap();
    let parent = s.snapshot().get(&top.id).unwrap().clone();
    assert_eq!(parent.reply_window[1].contents, "edited reply");
    assert_eq!(parent.reply_window[0].contents, "comment 0");
    assert_eq!(parent.reply_total_count, 2);
}

#[tokio::test]
async fn edit_pulling_in_new_replies_keeps_count_above_window() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let replies = f.add_many(Some(top.id), 2).await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(top.id).await.unwrap();

    f.add(Some(top.id), 3, "someone else's reply").await;
    s.edit(replies[0], String::from("edited")).await.unwrap();
    let parent = s.snapshot().get(&top.id).unwrap().clone();
    assert_eq!(parent.reply_window.len(), 3);
    assert_eq!(parent.reply_total_count, 3);
    assert_eq!(parent.reply_window[0].contents, "edited");
}

#[tokio::test]
async fn edit_confirmed_after_its_parent_is_gone_is_discarded() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let replies = f.add_many(Some(top.id), 2).await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(top.id).await.unwrap();

    let edit = s.request_edit(replies[0], String::from("edited")).unwrap();
    let resp = edit.send(&f.store).await;
    s.delete(top.id).await.unwrap();

    assert!(s.handle(resp).unwrap().is_none());
    assert!(s.status(Scope::Replies(top.id)).is_none());
    assert!(s.snapshot().comments().is_empty());
}

#[tokio::test]
async fn pages_of_different_scopes_land_in_their_own_branch() {
    let f = Fixture::new(2).await;
    let tops = f.add_many(None, 3).await;
    let replies = f.add_many(Some(tops[0]), 3).await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(tops[0]).await.unwrap();

    let more_top = s.request_more(Scope::TopLevel).expect("top-level request");
    let more_replies = s
        .request_more(Scope::Replies(tops[0]))
        .expect("replies request");
    let top_resp = more_top.send(&f.store).await;
    let replies_resp = more_replies.send(&f.store).await;

    // The reply page comes back first
    assert!(s.handle(replies_resp).unwrap().is_none());
    assert_eq!(reply_ids(&s, tops[0]), replies);
    assert_eq!(top_level_ids(&s), tops[..2].to_vec());

    assert!(s.handle(top_resp).unwrap().is_none());
    assert_eq!(top_level_ids(&s), tops);
    assert_eq!(reply_ids(&s, tops[0]), replies);
    assert_eq!(s.snapshot().get(&tops[0]).unwrap().reply_total_count, 3);
}

#[tokio::test]
async fn deleting_a_top_level_comment_pulls_in_its_successor() {
    let f = Fixture::new(2).await;
    let ids = f.add_many(None, 3).await;
    f.add(Some(ids[0]), 3, "reply").await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(ids[0]).await.unwrap();
    assert!(s.status(Scope::Replies(ids[0])).is_some());

    s.delete(ids[0]).await.unwrap();
    assert_eq!(top_level_ids(&s), ids[1..].to_vec());
    assert!(s.status(Scope::Replies(ids[0])).is_none());
    assert_eq!(f.store.server().await.test_num_comments(), 2);
}

#[tokio::test]
async fn deleting_a_reply_recounts_the_window() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let replies = f.add_many(Some(top.id), 2).await;
    let mut s = f.session();
    s.load().await.unwrap();
    s.open_replies(top.id).await.unwrap();

    s.delete(replies[0]).await.unwrap();
    assert_eq!(reply_ids(&s, top.id), vec![replies[1]]);
    assert_eq!(s.snapshot().get(&top.id).unwrap().reply_total_count, 1);
}

#[tokio::test]
async fn page_transport_failure_is_an_empty_page() {
    let f = Fixture::new(10).await;
    let ids = f.add_many(None, 2).await;
    let mut s = f.session();

    f.store.server().await.fail_next(1);
    s.load().await.unwrap();
    assert!(s.snapshot().comments().is_empty());
    assert!(!s.status(Scope::TopLevel).unwrap().no_more);

    s.load().await.unwrap();
    assert_eq!(top_level_ids(&s), ids);
}

#[tokio::test]
async fn failed_mutations_leave_the_tree_untouched() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    let mut s = f.session();
    s.load().await.unwrap();
    let before = s.snapshot().clone();

    f.store.server().await.fail_next(1);
    let err = s.comment(String::from("lost")).await.unwrap_err();
    assert!(err.is_transport());
    assert!(s.snapshot().ptr_eq(&before));

    // Deleted behind the session's back
    f.store.server().await.delete(top.id).unwrap();
    assert!(matches!(
        s.reply(top.id, String::from("too late")).await,
        Err(Error::Api(api::Error::CommentNotFound(id))) if id == top.id
    ));
    assert!(matches!(
        s.edit(top.id, String::from("too late")).await,
        Err(Error::Api(api::Error::CommentNotFound(_)))
    ));
    assert!(s.snapshot().ptr_eq(&before));
}

#[tokio::test]
async fn stale_page_is_discarded_and_refresh_is_deferred() {
    let f = Fixture::new(2).await;
    let ids = f.add_many(None, 3).await;
    let mut s = f.session();
    s.load().await.unwrap();

    let more = s.request_more(Scope::TopLevel).expect("fetch-more request");
    assert!(s.request_more(Scope::TopLevel).is_none());

    let delete = s.request_delete(ids[0]).unwrap();
    let resp = delete.send(&f.store).await;
    // The refresh would fetch the very bookmark `more` is fetching
    assert!(s.handle(resp).unwrap().is_none());
    assert_eq!(top_level_ids(&s), vec![ids[1]]);

    let resp = more.send(&f.store).await;
    let refresh = s.handle(resp).unwrap().expect("deferred refresh");
    assert_eq!(top_level_ids(&s), vec![ids[1]]);

    s.settle(refresh).await.unwrap();
    assert_eq!(top_level_ids(&s), ids[1..].to_vec());
}

#[tokio::test]
async fn replies_of_a_removed_comment_are_discarded() {
    let f = Fixture::new(10).await;
    let top = f.add(None, 2, "top").await;
    f.add_many(Some(top.id), 2).await;
    let mut s = f.session();
    s.load().await.unwrap();

    let replies = s.request_replies(top.id).unwrap().expect("replies request");
    s.delete(top.id).await.unwrap();
    let resp = replies.send(&f.store).await;
    assert!(s.handle(resp).unwrap().is_none());
    assert!(s.snapshot().comments().is_empty());
}

#[tokio::test]
async fn run_follows_commands_and_visibility() {
    let f = Fixture::new(10).await;
    let ids = f.add_many(None, 2).await;
    let mut s = f.session();

    let (commands, receiver) = channel();
    let notifier = commands.notifier(Scope::TopLevel);
    notifier.last_item_visible();
    assert!(commands.send(Command::Comment(String::from("hello"))));
    assert!(commands.send(Command::Comment(String::from("   "))));
    assert!(commands.send(Command::Delete(CommentId(Uuid::from_u128(42)))));
    notifier.disconnect();
    notifier.last_item_visible();
    drop((commands, notifier));

    let mut snapshots = Vec::new();
    let mut failures = Vec::new();
    s.run(receiver, |u| match u {
        Update::Snapshot(t) => snapshots.push(t),
        Update::Failed(e) => failures.push(e),
    })
    .await;

    let last = snapshots.last().expect("at least one snapshot");
    assert!(last.ptr_eq(s.snapshot()));
    let comments = s.snapshot().comments();
    assert_eq!(comments.len(), 3);
    assert_eq!(comments[..2].iter().map(|c| c.id).collect::<Vec<_>>(), ids);
    assert_eq!(comments[2].contents, "hello");

    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .any(|e| matches!(e, Error::Api(api::Error::EmptyContents))));
    assert!(failures
        .iter()
        .any(|e| matches!(e, Error::UnknownTarget(_))));
}

#[tokio::test]
async fn post_feed_pages_through_posts() {
    let f = Fixture::new(2).await;
    for i in 0..2 {
        f.store
            .server()
            .await
            .admin_create_post(user(2), format!("post {i}"))
            .unwrap();
    }
    let mut feed = PostFeed::new(2);

    assert_eq!(feed.fetch_more(&f.store).await.unwrap(), 2);
    assert_eq!(feed.fetch_more(&f.store).await.unwrap(), 1);
    assert!(feed.no_more());
    assert_eq!(feed.fetch_more(&f.store).await.unwrap(), 0);
    assert_eq!(feed.posts()[0].id, f.post);
    assert_eq!(feed.posts()[2].title, "post 1");
}

#[tokio::test]
async fn created_post_shows_up_and_deleted_post_goes_away() {
    let f = Fixture::new(2).await;
    f.add_many(None, 2).await;
    let mut feed = PostFeed::new(2);
    assert_eq!(feed.fetch_more(&f.store).await.unwrap(), 1);
    assert!(feed.no_more());

    let new = api::NewPost {
        author: user(ME),
        title: String::from("new post"),
    };
    let created = feed.create(&f.store, new).await.unwrap();
    assert_eq!(
        feed.posts().iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![f.post, created.id]
    );

    let blank = api::NewPost {
        author: user(ME),
        title: String::from("  "),
    };
    assert!(matches!(
        feed.create(&f.store, blank).await,
        Err(Error::Api(api::Error::EmptyContents))
    ));

    feed.delete(&f.store, f.post).await.unwrap();
    assert_eq!(
        feed.posts().iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![created.id]
    );
    assert_eq!(f.store.server().await.test_num_comments(), 0);
    assert!(matches!(
        feed.delete(&f.store, f.post).await,
        Err(Error::Api(api::Error::PostNotFound(id))) if id == f.post
    ));
}
