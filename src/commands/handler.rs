//! Command execution.
//!
//! [`CommandHandler`] owns a handle to the storage engine and maps each
//! parsed [`Command`] to a typed engine operation, encoding the outcome
//! (including the error taxonomy) back into a [`RespValue`].
//!
//! Response conventions, matching Redis:
//! - value reads on missing or expired keys reply with the null bulk
//! - counter-style reads on missing keys reply `0`, aggregates reply `[]`
//! - typed operations against a live key of another kind reply with the
//!   `WRONGTYPE` error and change nothing
//! - arity and argument-format problems reply with an `ERR` line
//!
//! The handler itself never touches the network; the connection layer
//! serializes whatever comes back.

use crate::commands::Command;
use crate::protocol::RespValue;
use crate::storage::{StorageEngine, StorageError, TtlResult};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Executes commands against the shared storage engine.
///
/// Cheap to clone; every connection gets its own copy wrapping the same
/// engine.
#[derive(Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

fn arity_error(name: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_lowercase()
    ))
}

fn wrong_type() -> RespValue {
    RespValue::error(StorageError::WrongType.to_string())
}

fn bulk(s: String) -> RespValue {
    RespValue::bulk_string(Bytes::from(s))
}

fn bulk_array(items: Vec<String>) -> RespValue {
    RespValue::array(items.into_iter().map(bulk).collect())
}

fn parse_index(arg: &str) -> Option<i64> {
    arg.parse().ok()
}

impl CommandHandler {
    /// Creates a handler over the given engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes one command and returns the reply to send.
    pub fn execute(&self, command: Command) -> RespValue {
        let args = &command.args;
        match command.name.as_str() {
            // generic
            "PING" => self.cmd_ping(args),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "TYPE" => self.cmd_type(args),
            "KEYS" => self.cmd_keys(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "FLUSHDB" | "CLEAR" => self.cmd_flush(args),

            // hash
            "HSET" => self.cmd_hset(args),
            "HGET" => self.cmd_hget(args),
            "HDEL" => self.cmd_hdel(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HLEN" => self.cmd_hlen(args),

            // list
            "LPUSH" => self.cmd_push(args, true),
            "RPUSH" => self.cmd_push(args, false),
            "LPOP" => self.cmd_pop(args, true),
            "RPOP" => self.cmd_pop(args, false),
            "LLEN" => self.cmd_llen(args),
            "LRANGE" => self.cmd_lrange(args),

            // set
            "SADD" => self.cmd_sadd(args),
            "SREM" => self.cmd_srem(args),
            "SISMEMBER" => self.cmd_sismember(args),
            "SMEMBERS" => self.cmd_smembers(args),
            "SCARD" => self.cmd_scard(args),
            "SINTER" => self.cmd_sinter(args),
            "SUNION" => self.cmd_sunion(args),

            name => RespValue::error(format!("ERR unknown command '{}'", name)),
        }
    }

    // ------------------------------------------------------------------
    // generic commands
    // ------------------------------------------------------------------

    /// PING [message]
    fn cmd_ping(&self, args: &[String]) -> RespValue {
        match args {
            [] => RespValue::pong(),
            [message] => bulk(message.clone()),
            _ => arity_error("PING"),
        }
    }

    /// SET key value [EX seconds]
    fn cmd_set(&self, args: &[String]) -> RespValue {
        if args.len() < 2 {
            return arity_error("SET");
        }
        let key = &args[0];
        let value = &args[1];

        let mut ttl: Option<Duration> = None;
        let mut i = 2;
        while i < args.len() {
            match args[i].to_uppercase().as_str() {
                "EX" => {
                    let Some(raw) = args.get(i + 1) else {
                        return RespValue::error("ERR syntax error");
                    };
                    match raw.parse::<i64>() {
                        Ok(secs) if secs > 0 => ttl = Some(Duration::from_secs(secs as u64)),
                        _ => return RespValue::error("ERR invalid expire time"),
                    }
                    i += 2;
                }
                _ => return RespValue::error("ERR syntax error"),
            }
        }

        match ttl {
            Some(ttl) => self.storage.set_with_ttl(key, value, ttl),
            None => self.storage.set(key, value),
        }
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("GET");
        };
        match self.storage.get_string(key) {
            Ok(value) => bulk(value),
            Err(e) if e.is_missing() => RespValue::null(),
            Err(_) => wrong_type(),
        }
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[String]) -> RespValue {
        if args.is_empty() {
            return arity_error("DEL");
        }
        let deleted = args.iter().filter(|key| self.storage.delete(key)).count();
        RespValue::integer(deleted as i64)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[String]) -> RespValue {
        if args.is_empty() {
            return arity_error("EXISTS");
        }
        let found = args.iter().filter(|key| self.storage.exists(key)).count();
        RespValue::integer(found as i64)
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[String]) -> RespValue {
        let [key, seconds] = args else {
            return arity_error("EXPIRE");
        };
        let Ok(seconds) = seconds.parse::<i64>() else {
            return RespValue::error("ERR invalid expire time");
        };
        // a non-positive ttl expires the key immediately
        let ttl = Duration::from_secs(seconds.max(0) as u64);
        RespValue::integer(self.storage.expire(key, ttl) as i64)
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("TTL");
        };
        match self.storage.ttl(key) {
            TtlResult::Remaining(d) => RespValue::integer(d.as_secs() as i64),
            TtlResult::NoExpiry => RespValue::integer(-1),
            TtlResult::Missing => RespValue::integer(-2),
        }
    }

    /// TYPE key
    fn cmd_type(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("TYPE");
        };
        match self.storage.kind(key) {
            Ok(kind) => RespValue::simple_string(kind.name()),
            Err(_) => RespValue::simple_string("none"),
        }
    }

    /// KEYS pattern
    fn cmd_keys(&self, args: &[String]) -> RespValue {
        let [pattern] = args else {
            return arity_error("KEYS");
        };
        bulk_array(self.storage.keys(pattern))
    }

    /// DBSIZE
    fn cmd_dbsize(&self, args: &[String]) -> RespValue {
        if !args.is_empty() {
            return arity_error("DBSIZE");
        }
        RespValue::integer(self.storage.len() as i64)
    }

    /// FLUSHDB / CLEAR
    fn cmd_flush(&self, args: &[String]) -> RespValue {
        if !args.is_empty() {
            return arity_error("FLUSHDB");
        }
        self.storage.clear();
        RespValue::ok()
    }

    // ------------------------------------------------------------------
    // hash commands
    // ------------------------------------------------------------------

    /// HSET key field value [field value ...]
    fn cmd_hset(&self, args: &[String]) -> RespValue {
        if args.len() < 3 || args.len() % 2 != 1 {
            return arity_error("HSET");
        }
        let key = &args[0];
        let mut created = 0;
        for pair in args[1..].chunks(2) {
            match self.storage.hset(key, &pair[0], &pair[1]) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(_) => return wrong_type(),
            }
        }
        RespValue::integer(created)
    }

    /// HGET key field
    fn cmd_hget(&self, args: &[String]) -> RespValue {
        let [key, field] = args else {
            return arity_error("HGET");
        };
        match self.storage.hget(key, field) {
            Ok(value) => bulk(value),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::null(),
        }
    }

    /// HDEL key field [field ...]
    fn cmd_hdel(&self, args: &[String]) -> RespValue {
        if args.len() < 2 {
            return arity_error("HDEL");
        }
        let key = &args[0];
        let mut removed = 0;
        for field in &args[1..] {
            match self.storage.hdel(key, field) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(StorageError::WrongType) => return wrong_type(),
                Err(_) => break, // key absent: nothing left to delete
            }
        }
        RespValue::integer(removed)
    }

    /// HEXISTS key field
    fn cmd_hexists(&self, args: &[String]) -> RespValue {
        let [key, field] = args else {
            return arity_error("HEXISTS");
        };
        match self.storage.hexists(key, field) {
            Ok(found) => RespValue::integer(found as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    /// HGETALL key
    fn cmd_hgetall(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("HGETALL");
        };
        match self.storage.hgetall(key) {
            Ok(entries) => RespValue::array(
                entries
                    .into_iter()
                    .flat_map(|(field, value)| [bulk(field), bulk(value)])
                    .collect(),
            ),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::array(vec![]),
        }
    }

    /// HKEYS key
    fn cmd_hkeys(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("HKEYS");
        };
        match self.storage.hkeys(key) {
            Ok(fields) => bulk_array(fields),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::array(vec![]),
        }
    }

    /// HLEN key
    fn cmd_hlen(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("HLEN");
        };
        match self.storage.hlen(key) {
            Ok(len) => RespValue::integer(len as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    // ------------------------------------------------------------------
    // list commands
    // ------------------------------------------------------------------

    /// LPUSH / RPUSH key value [value ...]
    fn cmd_push(&self, args: &[String], left: bool) -> RespValue {
        if args.len() < 2 {
            return arity_error(if left { "LPUSH" } else { "RPUSH" });
        }
        let key = &args[0];
        let values = &args[1..];
        let result = if left {
            self.storage.lpush(key, values)
        } else {
            self.storage.rpush(key, values)
        };
        match result {
            Ok(len) => RespValue::integer(len as i64),
            Err(_) => wrong_type(),
        }
    }

    /// LPOP / RPOP key
    fn cmd_pop(&self, args: &[String], left: bool) -> RespValue {
        let [key] = args else {
            return arity_error(if left { "LPOP" } else { "RPOP" });
        };
        let result = if left {
            self.storage.lpop(key)
        } else {
            self.storage.rpop(key)
        };
        match result {
            Ok(value) => bulk(value),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::null(),
        }
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("LLEN");
        };
        match self.storage.llen(key) {
            Ok(len) => RespValue::integer(len as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    /// LRANGE key start stop
    fn cmd_lrange(&self, args: &[String]) -> RespValue {
        let [key, start, stop] = args else {
            return arity_error("LRANGE");
        };
        let (Some(start), Some(stop)) = (parse_index(start), parse_index(stop)) else {
            return RespValue::error("ERR value is not an integer or out of range");
        };
        match self.storage.lrange(key, start, stop) {
            Ok(elements) => bulk_array(elements),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::array(vec![]),
        }
    }

    // ------------------------------------------------------------------
    // set commands
    // ------------------------------------------------------------------

    /// SADD key member [member ...]
    fn cmd_sadd(&self, args: &[String]) -> RespValue {
        if args.len() < 2 {
            return arity_error("SADD");
        }
        match self.storage.sadd(&args[0], &args[1..]) {
            Ok(added) => RespValue::integer(added as i64),
            Err(_) => wrong_type(),
        }
    }

    /// SREM key member [member ...]
    fn cmd_srem(&self, args: &[String]) -> RespValue {
        if args.len() < 2 {
            return arity_error("SREM");
        }
        match self.storage.srem(&args[0], &args[1..]) {
            Ok(removed) => RespValue::integer(removed as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    /// SISMEMBER key member
    fn cmd_sismember(&self, args: &[String]) -> RespValue {
        let [key, member] = args else {
            return arity_error("SISMEMBER");
        };
        match self.storage.sismember(key, member) {
            Ok(found) => RespValue::integer(found as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    /// SMEMBERS key
    fn cmd_smembers(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("SMEMBERS");
        };
        match self.storage.smembers(key) {
            Ok(members) => bulk_array(members),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::array(vec![]),
        }
    }

    /// SCARD key
    fn cmd_scard(&self, args: &[String]) -> RespValue {
        let [key] = args else {
            return arity_error("SCARD");
        };
        match self.storage.scard(key) {
            Ok(count) => RespValue::integer(count as i64),
            Err(StorageError::WrongType) => wrong_type(),
            Err(_) => RespValue::integer(0),
        }
    }

    /// SINTER key [key ...]
    fn cmd_sinter(&self, args: &[String]) -> RespValue {
        if args.is_empty() {
            return arity_error("SINTER");
        }
        match self.storage.sinter(args) {
            Ok(members) => bulk_array(members),
            Err(_) => wrong_type(),
        }
    }

    /// SUNION key [key ...]
    fn cmd_sunion(&self, args: &[String]) -> RespValue {
        if args.is_empty() {
            return arity_error("SUNION");
        }
        match self.storage.sunion(args) {
            Ok(members) => bulk_array(members),
            Err(_) => wrong_type(),
        }
    }
}
