use battlebots::board::BoardState;
use battlebots::prediction::{HttpPredictionClient, PredictionClient, PredictionError, PredictionRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::Duration;

/// Serve one HTTP request with `status` and `body`, handing the raw request
/// back through the returned channel.
async fn respond_once(status: &'static str, body: &'static str) -> anyhow::Result<(String, oneshot::Receiver<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
        anyhow::Ok(())
    });

    Ok((format!("http://{}", addr), rx))
}

fn request() -> PredictionRequest {
    PredictionRequest {
        board_state: BoardState::new(5),
        ship_types: Vec::new(),
    }
}

#[tokio::test]
async fn posts_board_and_parses_prediction() -> anyhow::Result<()> {
    let (base, seen) = respond_once("200 OK", r#"{"x":2,"y":3,"prob":[[0.1,0.2],[0.3,0.4]]}"#).await?;
    let client = HttpPredictionClient::new(&base, Duration::from_secs(5))?;
    assert_eq!(client.endpoint().path(), "/prediction");

    let prediction = client.predict(&request()).await?;
    assert_eq!((prediction.x, prediction.y), (2, 3));
    assert_eq!(prediction.prob[1][0], 0.3);

    let raw = seen.await?;
    assert!(raw.starts_with("POST /prediction HTTP/1.1"));
    assert!(raw.contains("\"board_state\":[[-1,-1,-1,-1,-1]"));
    assert!(raw.contains("\"ship_types\":[]"));
    Ok(())
}

#[tokio::test]
async fn non_200_is_a_status_error() -> anyhow::Result<()> {
    let (base, _seen) = respond_once("500 Internal Server Error", r#"{"error":"boom"}"#).await?;
    let client = HttpPredictionClient::new(&base, Duration::from_secs(5))?;
    match client.predict(&request()).await {
        Err(PredictionError::Status(500)) => Ok(()),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn garbage_body_is_an_invalid_response() -> anyhow::Result<()> {
    let (base, _seen) = respond_once("200 OK", r#"{"unexpected":true}"#).await?;
    let client = HttpPredictionClient::new(&base, Duration::from_secs(5))?;
    assert!(matches!(
        client.predict(&request()).await,
        Err(PredictionError::InvalidResponse(_))
    ));
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let client = HttpPredictionClient::new(&base, Duration::from_secs(5))?;
    assert!(matches!(
        client.predict(&request()).await,
        Err(PredictionError::Transport(_))
    ));
    Ok(())
}
