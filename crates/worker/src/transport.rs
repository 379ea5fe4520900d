//! Newline-delimited JSON over a reader/writer pair.
//!
//! Every envelope is dispatched on its own task, so a slow fetch never holds
//! up an unrelated event. Replies funnel through one writer task.

use crate::error::WorkerError;
use crate::events::{Envelope, Reply, ReplyBody};
use crate::handler::ServiceWorker;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Serve events from `reader` until EOF, writing replies to `writer`.
///
/// In-flight events are finished before returning; detached store writes
/// they started may not be.
pub async fn serve<R, W>(worker: ServiceWorker, reader: R, writer: W) -> Result<(), WorkerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Reply>();
    let writer_task = tokio::spawn(write_replies(rx, writer));

    let mut tasks = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        reap(&mut tasks);
        if line.trim().is_empty() {
            continue;
        }

        match Envelope::parse(&line) {
            Ok(Envelope { id, event }) => {
                let worker = worker.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let body = worker.dispatch(event).await;
                    let _ = tx.send(Reply { id, body });
                });
            }
            Err((id, e)) => {
                tracing::warn!(error = %e, "rejecting envelope");
                let _ = tx.send(Reply { id, body: ReplyBody::from(e) });
            }
        }
    }

    tracing::info!(pending = tasks.len(), "input closed");
    while let Some(joined) = tasks.join_next().await {
        log_join(joined);
    }
    drop(tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(WorkerError::Io(std::io::Error::other(e))),
    }
}

/// Drop finished event tasks so the set only holds in-flight events.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.try_join_next() {
        log_join(joined);
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "event task panicked");
    }
}

async fn write_replies<W>(mut rx: mpsc::UnboundedReceiver<Reply>, mut writer: W) -> Result<(), WorkerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let mut line = serde_json::to_vec(&reply)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dougcast_client::testing::StubFetcher;
    use dougcast_core::{CacheDb, Manifest, Response};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use url::Url;

    async fn worker(fetcher: Arc<StubFetcher>) -> ServiceWorker {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        ServiceWorker::new(fetcher, db, Manifest::builtin(), Url::parse("http://localhost:8080/").unwrap()).unwrap()
    }

    async fn run(worker: ServiceWorker, input: &str) -> Vec<Value> {
        let (writer, mut output) = tokio::io::duplex(1 << 20);
        serve(worker, input.as_bytes(), writer).await.unwrap();

        let mut raw = String::new();
        output.read_to_string(&mut raw).await.unwrap();
        raw.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
    }

    fn by_id(replies: &[Value], id: Value) -> &Value {
        replies.iter().find(|r| r["id"] == id).unwrap()
    }

    #[tokio::test]
    async fn test_replies_echo_ids() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond("http://localhost:8080/app.js", Response::new(200, "js"));
        let input = concat!(
            r#"{"id":1,"event":"message","data":{"type":"SKIP_WAITING"}}"#,
            "\n",
            r#"{"id":2,"event":"fetch","request":{"url":"http://localhost:8080/app.js"}}"#,
            "\n",
            "\n",
            r#"{"id":"three","event":"push"}"#,
            "\n",
        );

        let replies = run(worker(fetcher).await, input).await;
        assert_eq!(replies.len(), 3);
        assert_eq!(by_id(&replies, json!(1))["commands"], json!([{"command": "skip_waiting"}]));
        assert_eq!(by_id(&replies, json!(2))["status"], json!("respond"));
        assert_eq!(by_id(&replies, json!(2))["response"]["body"], json!("anM="));
        assert_eq!(by_id(&replies, json!("three"))["commands"], json!([]));
    }

    #[tokio::test]
    async fn test_bad_lines_get_failed_replies() {
        let fetcher = Arc::new(StubFetcher::new());
        let input = "garbage\n{\"id\":5,\"event\":\"fetch\"}\n";

        let replies = run(worker(fetcher).await, input).await;
        assert_eq!(replies.len(), 2);
        for reply in &replies {
            assert_eq!(reply["status"], json!("failed"));
            assert_eq!(reply["code"], json!("INVALID_INPUT"));
        }
        assert!(replies.iter().any(|r| r["id"] == json!(5)));
        assert!(replies.iter().any(|r| r["id"] == Value::Null));
    }

    #[tokio::test]
    async fn test_reap_keeps_only_in_flight_tasks() {
        let mut tasks = JoinSet::new();
        for _ in 0..32 {
            tasks.spawn(async {});
        }
        tasks.spawn(async { panic!("event handler bug") });
        tasks.spawn(std::future::pending::<()>());

        for _ in 0..100 {
            if tasks.len() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            reap(&mut tasks);
        }
        assert_eq!(tasks.len(), 1);
        tasks.abort_all();
    }

    #[tokio::test]
    async fn test_hanging_fetch_does_not_block_other_events() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.hang("https://media.example.com/slow.mp3");
        let worker = worker(fetcher).await;

        let (writer, output) = tokio::io::duplex(1 << 16);
        let (mut host, reader) = tokio::io::duplex(1 << 16);
        let server = tokio::spawn(serve(worker, tokio::io::BufReader::new(reader), writer));

        host.write_all(b"{\"id\":1,\"event\":\"fetch\",\"request\":{\"url\":\"https://media.example.com/slow.mp3\"}}\n")
            .await
            .unwrap();
        host.write_all(b"{\"id\":2,\"event\":\"message\",\"data\":{}}\n").await.unwrap();

        let mut lines = tokio::io::BufReader::new(output).lines();
        let first: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["id"], json!(2));

        server.abort();
    }
}
