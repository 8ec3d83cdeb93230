#![allow(missing_docs)]

use async_ftp::FtpStream;
use ftpgate::options::Options;
use ftpgate::{GatewayFs, JsonFileAuthenticator, JsonUserStore, ServerExt};
use ftpgate_core::meta::MetaList;
use ftpgate_sbe_local::LocalStorage;
use libunftp::ServerBuilder;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

static TESTPORT: AtomicU16 = AtomicU16::new(2250);

// keys derived from "not secret" and "also not secret" with 5000 iterations
const USERS: &str = r#"[
  {
    "id": 1,
    "username": "alice",
    "base_path": "/alice",
    "permission": 3256,
    "pbkdf2_salt": "thisisabadsalt",
    "pbkdf2_key": "Egbi+LYfwn00V+HwFq146kmhoE4TYaqPFCA7mKkfzEpSZe2zMqXz/8LfA7HjYvXgiLzOuDij2wf50eKcWOcjYQ==",
    "pbkdf2_iter": 5000
  },
  {
    "id": 2,
    "username": "bella",
    "base_path": "/bella",
    "permission": 1024,
    "disabled": true,
    "pbkdf2_salt": "thisisabadsalttoo",
    "pbkdf2_key": "9QSFDFRU80n1Jktu6s3Wo0XEArW3eQdw9zt4L9OBJjsGOYAsHfWqR4RKGwzve0Dih2M3Az+HHvKC9f43wYRRng==",
    "pbkdf2_iter": 5000
  }
]"#;

struct Harness {
    root: PathBuf,
    _tempdir: tempfile::TempDir,
    addr: String,
}

#[fixture]
async fn harness() -> Harness {
    let port = TESTPORT.fetch_add(1, Ordering::Relaxed);
    let addr = format!("127.0.0.1:{}", port);
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().join("storage");
    let uploads = tempdir.path().join("uploads");
    std::fs::create_dir_all(root.join("alice")).unwrap();
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::write(root.join("outside.txt"), "not for alice").unwrap();
    let users_file = tempdir.path().join("users.json");
    std::fs::write(&users_file, USERS).unwrap();

    let gateway = GatewayFs::new(Arc::new(LocalStorage::new(&root).unwrap()), Arc::new(MetaList::default())).with_temp_dir(uploads);
    let auth = Arc::new(JsonFileAuthenticator::from_file(&users_file).unwrap());
    let users = Arc::new(JsonUserStore::from_file(&users_file).unwrap());
    let options = Options {
        greeting: "Welcome test",
        passive_ports: 52000..=52999,
        ..Options::default()
    };

    let server = ServerBuilder::with_gateway(gateway, auth, users)
        .options(&options)
        .build()
        .unwrap()
        .listen(addr.clone());

    tokio::spawn(server);
    while FtpStream::connect(&addr).await.is_err() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    Harness {
        root,
        _tempdir: tempdir,
        addr,
    }
}

async fn logged_in(harness: &Harness) -> FtpStream {
    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    ftp_stream.login("alice", "not secret").await.unwrap();
    ftp_stream
}

#[rstest]
#[awt]
#[tokio::test]
async fn login(#[future] harness: Harness) {
    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    assert!(ftp_stream.login("alice", "wrong").await.is_err());

    let mut ftp_stream = FtpStream::connect(&harness.addr).await.unwrap();
    assert!(ftp_stream.login("bella", "also not secret").await.is_err());

    logged_in(&harness).await;
}

#[rstest]
#[awt]
#[tokio::test]
async fn put_and_retrieve(#[future] harness: Harness) {
    let mut ftp_stream = logged_in(&harness).await;
    let content = b"Hello from this test!\n";
    let mut reader = Cursor::new(content);
    ftp_stream.put("greeting.txt", &mut reader).await.unwrap();

    // stored below the user's base path
    assert_eq!(std::fs::read(harness.root.join("alice/greeting.txt")).unwrap(), content);

    let remote_data = ftp_stream.simple_retr("greeting.txt").await.unwrap().into_inner();
    assert_eq!(remote_data, content);

    assert_eq!(ftp_stream.size("greeting.txt").await.unwrap(), Some(content.len()));
    let list = ftp_stream.list(None).await.unwrap();
    let line = list.iter().find(|l| l.contains("greeting.txt")).unwrap();
    assert!(line.contains(&format!(" {} ", content.len())), "{line}");
}

#[rstest]
#[awt]
#[tokio::test]
async fn directories(#[future] harness: Harness) {
    let mut ftp_stream = logged_in(&harness).await;
    ftp_stream.mkdir("reports").await.unwrap();
    assert!(harness.root.join("alice/reports").is_dir());

    ftp_stream.cwd("reports").await.unwrap();
    assert_eq!(ftp_stream.pwd().await.unwrap(), "/reports");
    ftp_stream.put("q1.csv", &mut Cursor::new(b"a,b\n1,2\n")).await.unwrap();
    let names = ftp_stream.nlst(None).await.unwrap();
    assert!(names.iter().any(|n| n.ends_with("q1.csv")), "{names:?}");

    ftp_stream.rename("q1.csv", "q2.csv").await.unwrap();
    assert!(harness.root.join("alice/reports/q2.csv").is_file());

    ftp_stream.rm("q2.csv").await.unwrap();
    ftp_stream.cdup().await.unwrap();
    ftp_stream.rmdir("reports").await.unwrap();
    assert!(!harness.root.join("alice/reports").exists());
}

#[rstest]
#[awt]
#[tokio::test]
async fn stays_below_base_path(#[future] harness: Harness) {
    let mut ftp_stream = logged_in(&harness).await;
    assert!(ftp_stream.simple_retr("outside.txt").await.is_err());
    assert!(ftp_stream.simple_retr("../outside.txt").await.is_err());
    assert!(ftp_stream.simple_retr("/../outside.txt").await.is_err());
    assert!(ftp_stream.rm("../outside.txt").await.is_err());
    assert_eq!(std::fs::read_to_string(harness.root.join("outside.txt")).unwrap(), "not for alice");
}
