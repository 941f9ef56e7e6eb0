use std::time::Duration;

use chanexpect::*;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Hello { version: u8 },
    Auth(String),
    Ping,
    Data(Vec<u8>),
    Bye,
}

// A toy server that performs a handshake, streams data and says goodbye.
async fn serve(tx: mpsc::Sender<Frame>, chunks: usize) {
    let frames = [Frame::Hello { version: 2 }, Frame::Auth("token".into())];
    for frame in frames {
        let _ = tx.send(frame).await;
    }
    for i in 0..chunks {
        let _ = tx.send(Frame::Ping).await;
        let _ = tx.send(Frame::Data(vec![i as u8; 4])).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let _ = tx.send(Frame::Bye).await;
}

#[tokio::main]
async fn main() -> Result {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (tx, rx) = mpsc::channel(32);

    let mut expecter = Expecter::new(rx)
        // Keep-alives may arrive at any time
        .ignore([eq(Frame::Ping)])
        // Hello and Auth, in either order, within 100ms
        .expect_timeout(
            Duration::from_millis(100),
            [all_of([
                predicate(|f: &Frame| matches!(f, Frame::Hello { version: 2.. })),
                predicate(|f: &Frame| matches!(f, Frame::Auth(_))),
            ])?],
        )
        // A layer is left as soon as it is satisfied, so count data frames exactly
        .expect([exactly_n_of(
            3,
            [predicate(|f: &Frame| matches!(f, Frame::Data(_)))],
        )?])
        .expect([one_of([eq(Frame::Bye)])?]);

    expecter.listen()?;
    tokio::spawn(serve(tx, 3));

    let errors = expecter.await_satisfied(Duration::from_secs(1)).await;
    expecter.print_trace();

    if errors.is_empty() {
        println!("handshake verified ({} frames)", expecter.processed_messages().len());
    } else {
        println!("{errors}");
    }
    Ok(())
}
