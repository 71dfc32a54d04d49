/// A local server that speaks just enough of the PostgreSQL startup protocol
/// to drive the connector through its failure paths without Docker
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the server answers a startup message
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// AuthenticationCleartextPassword
    RequestPassword,
    /// FATAL 57P03 "the database system is starting up"
    StartingUp,
    /// Close the socket without answering
    Hangup,
    /// AuthenticationOk followed by ReadyForQuery
    Accept,
}

/// Fake server handle; the last reply repeats for every later connection
pub struct FakeServer {
    pub port: u16,
    accepts: Arc<AtomicU32>,
}

impl FakeServer {
    pub async fn start(replies: Vec<Reply>) -> Self {
        assert!(!replies.is_empty(), "at least one reply is needed");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&accepts);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let seen = counter.fetch_add(1, Ordering::SeqCst) as usize;
                let reply = replies[seen.min(replies.len() - 1)];
                tokio::spawn(serve(socket, reply));
            }
        });

        Self { port, accepts }
    }

    /// Number of TCP connections accepted so far
    pub fn accepts(&self) -> u32 {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Attribute string pointing at this server, without a password
    pub fn connection_string(&self) -> String {
        format!(
            "Server=127.0.0.1;Port={};UID=app;SSLMODE=disable;ConnectTimeout=5",
            self.port
        )
    }
}

async fn serve(mut socket: TcpStream, reply: Reply) {
    // StartupMessage: int32 length (self included), then the body
    let Ok(len) = socket.read_i32().await else {
        return;
    };
    let mut body = vec![0; usize::try_from(len - 4).unwrap_or(0)];
    if socket.read_exact(&mut body).await.is_err() {
        return;
    }

    let response = match reply {
        Reply::Hangup => return,
        Reply::RequestPassword => message(b'R', &3_i32.to_be_bytes()),
        Reply::StartingUp => {
            let mut fields = Vec::new();
            for (tag, value) in [
                (b'S', "FATAL"),
                (b'V', "FATAL"),
                (b'C', "57P03"),
                (b'M', "the database system is starting up"),
            ] {
                fields.push(tag);
                fields.extend_from_slice(value.as_bytes());
                fields.push(0);
            }
            fields.push(0);
            message(b'E', &fields)
        }
        Reply::Accept => {
            let mut bytes = message(b'R', &0_i32.to_be_bytes());
            bytes.extend(message(b'Z', b"I"));
            bytes
        }
    };

    if socket.write_all(&response).await.is_err() {
        return;
    }

    if matches!(reply, Reply::Accept) {
        // Hold the session open until the client terminates it.
        let mut buf = [0_u8; 1024];
        while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
    }
}

/// Backend message: tag byte, int32 length (self included), body
fn message(tag: u8, body: &[u8]) -> Vec<u8> {
    let len = i32::try_from(body.len() + 4).unwrap();
    let mut bytes = vec![tag];
    bytes.extend_from_slice(&len.to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}
