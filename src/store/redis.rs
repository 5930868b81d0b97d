//! Redis Store Module
//!
//! [`KvStore`] implementation speaking RESP2 to a Redis server over TCP.
//!
//! Values are stored as their JSON text. Each command checks a connection
//! out of a small idle pool, or opens a new one when none is idle, so
//! in-flight requests never wait on each other. Each request costs exactly
//! one round trip.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::store::resp::{self, ParseResult, RespValue};
use crate::store::{KvStore, Lookup, StoreError, StoreResult};

/// Initial capacity of the per-connection read buffer.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Upper bound on establishing a TCP connection to Redis.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle connections kept for reuse; extra ones are closed on check-in.
pub const MAX_IDLE_CONNECTIONS: usize = 16;

// == Connection ==
/// One TCP connection to Redis plus its unread reply bytes.
#[derive(Debug)]
struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Connection {
    async fn open(address: &str) -> StoreResult<Self> {
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(StoreError::Connection(format!(
                    "failed to connect to {}: {}",
                    address, e
                )))
            }
            Err(_) => {
                return Err(StoreError::Connection(format!(
                    "timed out connecting to {} after {:?}",
                    address, CONNECT_TIMEOUT
                )))
            }
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        })
    }

    /// Sends one encoded command and waits for its reply.
    async fn call(&mut self, command: &[u8]) -> StoreResult<RespValue> {
        self.stream.write_all(command).await?;

        loop {
            match resp::parse(&self.buffer) {
                ParseResult::Ok(value, consumed) => {
                    self.buffer.advance(consumed);
                    return Ok(value);
                }
                ParseResult::Incomplete => {}
                ParseResult::Error(msg) => return Err(StoreError::Protocol(msg)),
            }

            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(StoreError::Connection(
                    "connection closed by server".to_string(),
                ));
            }
        }
    }
}

// == Redis Store ==
/// Key-value store backed by a Redis server.
///
/// The idle list lock is only taken to push or pop a connection, never
/// across a round trip or a connect.
#[derive(Debug)]
pub struct RedisStore {
    address: String,
    idle: Mutex<Vec<Connection>>,
}

impl RedisStore {
    /// Connects to Redis at `host:port` and verifies the link with PING.
    pub async fn connect(host: &str, port: u16) -> StoreResult<Self> {
        let address = format!("{}:{}", host, port);
        let connection = Connection::open(&address).await?;
        let store = Self {
            address,
            idle: Mutex::new(vec![connection]),
        };

        store.ping().await?;
        info!("Connected to Redis at {}", store.address);
        Ok(store)
    }

    /// Returns the `host:port` this store talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the number of idle pooled connections.
    pub fn idle_connections(&self) -> usize {
        self.idle_list().len()
    }

    fn idle_list(&self) -> std::sync::MutexGuard<'_, Vec<Connection>> {
        // Push and pop leave the Vec consistent even if a holder panicked.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn checkout(&self) -> StoreResult<Connection> {
        let pooled = self.idle_list().pop();
        match pooled {
            Some(connection) => Ok(connection),
            None => {
                debug!("Opening new Redis connection to {}", self.address);
                Connection::open(&self.address).await
            }
        }
    }

    fn checkin(&self, connection: Connection) {
        let mut idle = self.idle_list();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(connection);
        }
    }

    /// Runs one command on a checked-out connection. Error replies are
    /// returned as `StoreError::Server`; transport and protocol failures
    /// drop the connection so the next command opens a fresh one.
    async fn execute<A: AsRef<[u8]>>(&self, args: &[A]) -> StoreResult<RespValue> {
        let command = resp::encode_command(args);
        let mut connection = self.checkout().await?;

        match connection.call(&command).await {
            Ok(RespValue::Error(msg)) => {
                self.checkin(connection);
                Err(StoreError::Server(msg))
            }
            Ok(reply) => {
                self.checkin(connection);
                Ok(reply)
            }
            Err(e) => {
                // The stream may hold a partial reply; never reuse it.
                warn!("Dropping Redis connection after error: {}", e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set(&self, key: &str, value: &Value) -> StoreResult<u64> {
        let payload = serde_json::to_vec(value)?;
        let reply = self
            .execute(&[b"SET".as_slice(), key.as_bytes(), payload.as_slice()])
            .await?;

        Ok(match reply {
            RespValue::SimpleString(ref s) if s == "OK" => 1,
            other => {
                debug!("SET {} replied {:?}", key, other);
                0
            }
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Lookup> {
        match self.execute(&[b"GET".as_slice(), key.as_bytes()]).await? {
            RespValue::Null => Ok(Lookup::Absent),
            RespValue::BulkString(data) => Ok(Lookup::Found(decode_value(&data))),
            other => Err(unexpected_reply("GET", &other)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let reply = self.execute(&[b"DEL".as_slice(), key.as_bytes()]).await?;
        expect_count("DEL", reply)
    }

    async fn multi_set(&self, pairs: &[(String, Value)]) -> StoreResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut args: Vec<Vec<u8>> = Vec::with_capacity(1 + pairs.len() * 2);
        args.push(b"MSET".to_vec());
        for (key, value) in pairs {
            args.push(key.as_bytes().to_vec());
            args.push(serde_json::to_vec(value)?);
        }

        match self.execute(&args).await? {
            RespValue::SimpleString(_) => Ok(()),
            other => Err(unexpected_reply("MSET", &other)),
        }
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Lookup)>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(1 + keys.len());
        args.push(b"MGET");
        args.extend(keys.iter().map(|key| key.as_bytes()));

        let values = match self.execute(&args).await? {
            RespValue::Array(values) => values,
            other => return Err(unexpected_reply("MGET", &other)),
        };

        if values.len() != keys.len() {
            return Err(StoreError::Protocol(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }

        keys.iter()
            .cloned()
            .zip(values)
            .map(|(key, value)| match value {
                RespValue::Null => Ok((key, Lookup::Absent)),
                RespValue::BulkString(data) => Ok((key, Lookup::Found(decode_value(&data)))),
                other => Err(unexpected_reply("MGET", &other)),
            })
            .collect()
    }

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<u64> {
        // DEL with no keys is a malformed command.
        if keys.is_empty() {
            return Ok(0);
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(1 + keys.len());
        args.push(b"DEL");
        args.extend(keys.iter().map(|key| key.as_bytes()));

        let reply = self.execute(&args).await?;
        expect_count("DEL", reply)
    }

    async fn ping(&self) -> StoreResult<()> {
        match self.execute(&[b"PING".as_slice()]).await? {
            RespValue::SimpleString(ref s) if s == "PONG" => Ok(()),
            other => Err(unexpected_reply("PING", &other)),
        }
    }
}

// == Reply Helpers ==
/// Decodes a stored payload. Payloads written by other clients that are not
/// JSON come back as JSON strings.
fn decode_value(data: &[u8]) -> Value {
    serde_json::from_slice(data)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(data).into_owned()))
}

fn expect_count(command: &str, reply: RespValue) -> StoreResult<u64> {
    match reply {
        RespValue::Integer(n) if n >= 0 => Ok(n as u64),
        other => Err(unexpected_reply(command, &other)),
    }
}

fn unexpected_reply(command: &str, reply: &RespValue) -> StoreError {
    StoreError::Protocol(format!("unexpected {} reply: {:?}", command, reply))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bytes::Bytes;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tower::util::ServiceExt;

    use crate::api::{create_router, AppState};

    type FakeData = Arc<Mutex<HashMap<Bytes, Bytes>>>;

    /// In-process server answering a small subset of Redis commands.
    #[derive(Clone, Default)]
    struct FakeRedis {
        /// Reply to SET instead of storing and answering +OK
        set_reply: Option<RespValue>,
        /// Close each connection after this many commands
        close_after: Option<usize>,
        /// GET of this key is answered only after the delay
        slow_key: Option<(&'static str, Duration)>,
    }

    impl FakeRedis {
        /// Starts listening on an ephemeral port; every connection is
        /// served by its own task over shared data.
        async fn spawn(self) -> u16 {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let data = FakeData::default();

            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    tokio::spawn(self.clone().serve(socket, data.clone()));
                }
            });

            port
        }

        async fn serve(self, mut socket: TcpStream, data: FakeData) {
            let mut buffer = BytesMut::new();
            let mut handled = 0;

            loop {
                let command = match resp::parse(&buffer) {
                    ParseResult::Ok(RespValue::Array(args), consumed) => {
                        buffer.advance(consumed);
                        args
                    }
                    ParseResult::Incomplete => match socket.read_buf(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    },
                    _ => break,
                };

                if let Some((key, delay)) = self.slow_key {
                    if command.first() == Some(&RespValue::bulk("GET"))
                        && command.get(1) == Some(&RespValue::bulk(key))
                    {
                        tokio::time::sleep(delay).await;
                    }
                }

                let reply = {
                    let mut data = data.lock().unwrap();
                    self.handle_command(&mut data, command)
                };
                if socket.write_all(&resp::encode(&reply)).await.is_err() {
                    break;
                }

                handled += 1;
                if self.close_after == Some(handled) {
                    break;
                }
            }
        }

        fn handle_command(
            &self,
            data: &mut HashMap<Bytes, Bytes>,
            command: Vec<RespValue>,
        ) -> RespValue {
            let args: Vec<Bytes> = command
                .into_iter()
                .filter_map(|arg| match arg {
                    RespValue::BulkString(b) => Some(b),
                    _ => None,
                })
                .collect();

            match args.first().map(|name| name.as_ref()) {
                Some(b"PING") => RespValue::SimpleString("PONG".to_string()),
                Some(b"SET") if args.len() == 3 => match &self.set_reply {
                    Some(reply) => reply.clone(),
                    None => {
                        data.insert(args[1].clone(), args[2].clone());
                        RespValue::SimpleString("OK".to_string())
                    }
                },
                Some(b"GET") if args.len() == 2 => match data.get(&args[1]) {
                    Some(v) => RespValue::BulkString(v.clone()),
                    None => RespValue::Null,
                },
                Some(b"MSET") if args.len() >= 3 && args.len() % 2 == 1 => {
                    for pair in args[1..].chunks(2) {
                        data.insert(pair[0].clone(), pair[1].clone());
                    }
                    RespValue::SimpleString("OK".to_string())
                }
                Some(b"MGET") if args.len() >= 2 => RespValue::Array(
                    args[1..]
                        .iter()
                        .map(|k| match data.get(k) {
                            Some(v) => RespValue::BulkString(v.clone()),
                            None => RespValue::Null,
                        })
                        .collect(),
                ),
                Some(b"DEL") if args.len() >= 2 => {
                    let removed = args[1..]
                        .iter()
                        .filter(|k| data.remove(*k).is_some())
                        .count();
                    RespValue::Integer(removed as i64)
                }
                _ => RespValue::Error("ERR wrong number of arguments".to_string()),
            }
        }
    }

    async fn connect_to(fake: FakeRedis) -> RedisStore {
        let port = fake.spawn().await;
        RedisStore::connect("127.0.0.1", port).await.unwrap()
    }

    async fn connect_fake() -> RedisStore {
        connect_to(FakeRedis::default()).await
    }

    #[tokio::test]
    async fn test_redis_slow_command_does_not_block_others() {
        let store = Arc::new(
            connect_to(FakeRedis {
                slow_key: Some(("slow", Duration::from_millis(500))),
                ..Default::default()
            })
            .await,
        );

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.get("slow").await })
        };
        // Let the slow GET take the pooled connection and go in flight
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        assert_eq!(store.get("fast").await.unwrap(), Lookup::Absent);
        let elapsed = started.elapsed();
        assert!(
            elapsed < Duration::from_millis(200),
            "fast GET waited {:?}",
            elapsed
        );

        assert_eq!(slow.await.unwrap().unwrap(), Lookup::Absent);
        assert_eq!(store.idle_connections(), 2);
    }

    #[tokio::test]
    async fn test_redis_reconnects_after_server_close() {
        // The server hangs up after answering the startup PING
        let store = connect_to(FakeRedis {
            close_after: Some(1),
            ..Default::default()
        })
        .await;

        assert!(store.get("key1").await.is_err());
        assert_eq!(store.idle_connections(), 0);

        assert_eq!(store.set("key1", &json!("value1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redis_set_without_ok_counts_zero() {
        let store = connect_to(FakeRedis {
            set_reply: Some(RespValue::Null),
            ..Default::default()
        })
        .await;

        assert_eq!(store.set("key1", &json!("value1")).await.unwrap(), 0);
        assert_eq!(store.get("key1").await.unwrap(), Lookup::Absent);
    }

    #[tokio::test]
    async fn test_redis_set_without_ok_answers_505() {
        let store = connect_to(FakeRedis {
            set_reply: Some(RespValue::Null),
            ..Default::default()
        })
        .await;
        let app = create_router(AppState::new(store));

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/items/key1?value=value1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::HTTP_VERSION_NOT_SUPPORTED);
    }

    #[tokio::test]
    async fn test_redis_set_and_get() {
        let store = connect_fake().await;

        assert_eq!(store.set("key1", &json!("value1")).await.unwrap(), 1);
        assert_eq!(
            store.get("key1").await.unwrap(),
            Lookup::Found(json!("value1"))
        );
    }

    #[tokio::test]
    async fn test_redis_stored_null_is_found() {
        let store = connect_fake().await;

        store.set("nothing", &Value::Null).await.unwrap();
        assert_eq!(
            store.get("nothing").await.unwrap(),
            Lookup::Found(Value::Null)
        );
        assert_eq!(store.get("missing").await.unwrap(), Lookup::Absent);
    }

    #[tokio::test]
    async fn test_redis_structured_value() {
        let store = connect_fake().await;
        let value = json!({"name": "widget", "tags": ["a", "b"], "count": 3});

        store.set("doc", &value).await.unwrap();
        assert_eq!(store.get("doc").await.unwrap(), Lookup::Found(value));
    }

    #[tokio::test]
    async fn test_redis_delete() {
        let store = connect_fake().await;
        store.set("key1", &json!("value1")).await.unwrap();

        assert_eq!(store.delete("key1").await.unwrap(), 1);
        assert_eq!(store.delete("key1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_redis_multi_set_and_get() {
        let store = connect_fake().await;
        let pairs = vec![
            ("key1".to_string(), json!("value1")),
            ("key2".to_string(), json!("value2")),
        ];
        store.multi_set(&pairs).await.unwrap();

        let keys = vec!["key2".to_string(), "absent".to_string(), "key1".to_string()];
        assert_eq!(
            store.multi_get(&keys).await.unwrap(),
            vec![
                ("key2".to_string(), Lookup::Found(json!("value2"))),
                ("absent".to_string(), Lookup::Absent),
                ("key1".to_string(), Lookup::Found(json!("value1"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_redis_multi_delete_duplicates() {
        let store = connect_fake().await;
        store.set("k", &json!("v")).await.unwrap();

        let keys = vec!["k".to_string(), "k".to_string()];
        assert_eq!(store.multi_delete(&keys).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redis_multi_delete_empty_skips_store() {
        let store = connect_fake().await;
        assert_eq!(store.multi_delete(&[]).await.unwrap(), 0);
        // Connection is still usable afterwards
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_large_key_and_value() {
        let store = connect_fake().await;
        let key = "k".repeat(10_000);
        let value = json!("v".repeat(10_000));

        store.set(&key, &value).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Lookup::Found(value));
    }

    #[tokio::test]
    async fn test_redis_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = RedisStore::connect("127.0.0.1", port).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }

    #[test]
    fn test_decode_value_non_json() {
        assert_eq!(decode_value(b"plain text"), json!("plain text"));
        assert_eq!(decode_value(b"[1,2]"), json!([1, 2]));
    }

    #[test]
    fn test_expect_count_rejects_other_replies() {
        assert_eq!(expect_count("DEL", RespValue::Integer(3)).unwrap(), 3);
        assert!(matches!(
            expect_count("DEL", RespValue::Null),
            Err(StoreError::Protocol(_))
        ));
    }
}
