use std::sync::Arc;

use anyhow::Context;
use remark_client::{
    api::{CommentId, NewPost, PostId, UserId, Uuid},
    Config, HttpStore, PostFeed, Scope, Session,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    /// Page size the store was configured with
    #[structopt(long, default_value = "10")]
    page_size: usize,

    /// User to comment as
    #[structopt(short, long)]
    user: Option<Uuid>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List posts
    Posts,

    /// Create a post
    NewPost { title: String },

    /// Delete a post, along with its comments
    DeletePost { post: Uuid },

    /// Show all comments of a post
    Show { post: Uuid },

    /// Comment on a post
    Comment { post: Uuid, contents: String },

    /// Reply to a comment or to a reply
    Reply {
        post: Uuid,
        to: Uuid,
        contents: String,
    },

    /// Edit a comment
    Edit {
        post: Uuid,
        comment: Uuid,
        contents: String,
    },

    /// Delete a comment, along with its replies
    Delete { post: Uuid, comment: Uuid },
}

fn token() -> anyhow::Result<Option<Uuid>> {
    match std::env::var("REMARK_TOKEN") {
        Err(std::env::VarError::NotPresent) => Ok(None),
        tok => {
            let tok = tok.context("retrieving REMARK_TOKEN environment variable")?;
            let tok = Uuid::try_parse(&tok).context("parsing REMARK_TOKEN as an auth token")?;
            Ok(Some(tok))
        }
    }
}

fn scope_len(s: &Session<HttpStore>, scope: Scope) -> usize {
    s.snapshot().scope_items(scope).map_or(0, |i| i.len())
}

/// Fetches pages until the scope is known to be fully loaded
async fn load_scope(s: &mut Session<HttpStore>, scope: Scope) -> anyhow::Result<()> {
    loop {
        let before = scope_len(s, scope);
        s.fetch_more(scope).await?;
        let done = s.status(scope).map_or(true, |st| st.no_more);
        // A failed fetch counts as an empty page without ending the listing
        if done || scope_len(s, scope) == before {
            return Ok(());
        }
    }
}

async fn load_all(s: &mut Session<HttpStore>) -> anyhow::Result<()> {
    load_scope(s, Scope::TopLevel).await?;
    let parents = s
        .snapshot()
        .comments()
        .iter()
        .filter(|c| c.reply_total_count > 0)
        .map(|c| c.id)
        .collect::<Vec<_>>();
    for parent in parents {
        load_scope(s, Scope::Replies(parent)).await?;
    }
    tracing::info!(
        comments = s.snapshot().comments().len(),
        "loaded post {:?}",
        s.post()
    );
    Ok(())
}

fn print(s: &Session<HttpStore>) {
    for c in s.snapshot().comments() {
        println!("{} [{}] {}", c.id.0, c.author.0, c.contents);
        for r in c.reply_window.iter() {
            match r.mention {
                Some(m) => println!("  {} [{}] @{} {}", r.id.0, r.author.0, m.0, r.contents),
                None => println!("  {} [{}] {}", r.id.0, r.author.0, r.contents),
            }
        }
        if c.has_unloaded_replies() {
            println!("  ({} more replies)", c.reply_total_count - c.reply_window.len());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let store = Arc::new(HttpStore::new(opt.host.clone(), token()?));
    let config = Config::with_page_size(opt.page_size);
    let user = UserId(opt.user.unwrap_or_else(Uuid::nil));
    let session = |post: Uuid| Session::new(store.clone(), config.clone(), PostId(post), user);

    match opt.cmd {
        Command::Posts => {
            let mut feed = PostFeed::new(opt.page_size);
            while !feed.no_more() {
                if feed.fetch_more(&*store).await? == 0 {
                    break;
                }
            }
            for p in feed.posts() {
                println!("{} {}", p.id.0, p.title);
            }
        }
        Command::NewPost { title } => {
            let author = opt.user.context("--user is required to post")?;
            let mut feed = PostFeed::new(opt.page_size);
            let post = feed
                .create(
                    &*store,
                    NewPost {
                        author: UserId(author),
                        title,
                    },
                )
                .await?;
            println!("{}", post.id.0);
        }
        Command::DeletePost { post } => {
            let mut feed = PostFeed::new(opt.page_size);
            feed.delete(&*store, PostId(post)).await?;
            tracing::info!("post deleted");
        }
        Command::Show { post } => {
            let mut s = session(post);
            load_all(&mut s).await?;
            print(&s);
        }
        Command::Comment { post, contents } => {
            opt.user.context("--user is required to comment")?;
            let mut s = session(post);
            s.comment(contents).await?;
            tracing::info!("comment created");
        }
        Command::Reply { post, to, contents } => {
            opt.user.context("--user is required to reply")?;
            let mut s = session(post);
            load_all(&mut s).await?;
            s.reply(CommentId(to), contents).await?;
            tracing::info!("reply created");
        }
        Command::Edit {
            post,
            comment,
            contents,
        } => {
            let mut s = session(post);
            load_all(&mut s).await?;
            s.edit(CommentId(comment), contents).await?;
            tracing::info!("comment edited");
        }
        Command::Delete { post, comment } => {
            let mut s = session(post);
            load_all(&mut s).await?;
            s.delete(CommentId(comment)).await?;
            tracing::info!("comment deleted");
        }
    }

    Ok(())
}
