use std::path::Path;

use tempfile::tempdir;
use ticker_board::{CliArgs, Command, ServiceArgs, ViewArg};
use url::Url;

const POSTS: &str = r#"[
  {
    "id": "p1",
    "author": "QuietHeron101",
    "ticker": "MSFT",
    "title": "Cloud margins this quarter",
    "content": "Azure keeps growing. Compare with $AMZN before #earnings.",
    "createdAt": "2026-10-18T09:00:00Z",
    "replies": [
      {
        "id": "r1",
        "author": "BoldLynx204",
        "content": "Margins look fine to me.",
        "createdAt": "2026-10-18T10:00:00Z",
        "bullishVotes": 7,
        "bearishVotes": 0,
        "votes": { "QuietHeron101": "bullish", "SwiftCrane333": "bearish" }
      }
    ]
  },
  {
    "id": "p2",
    "author": "BoldLynx204",
    "ticker": "GOOGL",
    "title": "Search ad revenue",
    "content": "Anyone tracking this?",
    "createdAt": "2026-10-17T09:00:00Z"
  }
]"#;

fn read_to_string(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn service() -> ServiceArgs {
    ServiceArgs {
        api_key: None,
        api_base: Url::parse("http://127.0.0.1:9/").unwrap(),
        model: "gemini-2.5-flash".to_string(),
        user_agent: "test-agent".to_string(),
        max_concurrency: 1,
        timeout_secs: 1,
    }
}

fn render_args(dir: &Path, out: &Path, view: ViewArg, post: Option<&str>) -> CliArgs {
    let posts = dir.join("posts.json");
    std::fs::write(&posts, POSTS).unwrap();
    CliArgs {
        posts: Some(posts),
        identity_file: dir.join("state").join("identity.json"),
        quiet_period_ms: 800,
        service: service(),
        command: Command::Render {
            out: out.to_path_buf(),
            view,
            post: post.map(str::to_string),
            search: None,
            company: None,
        },
    }
}

#[tokio::test]
async fn renders_list_and_remembers_identity() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("site").join("index.html");

    ticker_board::run(render_args(tmp.path(), &out, ViewArg::List, None))
        .await
        .unwrap();

    let html = read_to_string(&out);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Cloud margins this quarter"));
    assert!(html.contains("Search ad revenue"));
    assert!(html.contains(r#"<span class="tb-ticker">$GOOGL</span>"#));
    // Newest first.
    assert!(html.find("post-p1").unwrap() < html.find("post-p2").unwrap());

    let identity = tmp.path().join("state").join("identity.json");
    let saved: serde_json::Value = serde_json::from_str(&read_to_string(&identity)).unwrap();
    let name = saved["anonymous_user"].as_str().unwrap().to_string();
    assert!(html.contains(&format!("Signed in as {name}")));

    // Second run keeps the same name.
    let again = tmp.path().join("again.html");
    ticker_board::run(render_args(tmp.path(), &again, ViewArg::List, None))
        .await
        .unwrap();
    assert!(read_to_string(&again).contains(&format!("Signed in as {name}")));
}

#[tokio::test]
async fn renders_topic_with_recounted_votes() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("topic.html");

    ticker_board::run(render_args(tmp.path(), &out, ViewArg::List, Some("p1")))
        .await
        .unwrap();

    let html = read_to_string(&out);
    assert!(html.contains("<title>$MSFT · Cloud margins this quarter</title>"));
    assert!(html.contains(r#"data-ticker="AMZN""#));
    assert!(html.contains(r#"data-tag="earnings""#));
    assert!(html.contains("▲ bullish (1)"));
    assert!(html.contains("▼ bearish (1)"));
    assert!(!html.contains("Search ad revenue"));
}

#[tokio::test]
async fn renders_empty_bookmarks() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("bookmarks.html");

    ticker_board::run(render_args(tmp.path(), &out, ViewArg::Bookmarks, None))
        .await
        .unwrap();

    let html = read_to_string(&out);
    assert!(html.contains("<h1>Bookmarks</h1>"));
    assert!(html.contains("No bookmarked topics yet."));
}

#[tokio::test]
async fn unknown_post_is_an_error() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("missing.html");

    let err = ticker_board::run(render_args(tmp.path(), &out, ViewArg::List, Some("nope")))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(!out.exists());
}
