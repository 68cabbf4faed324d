//! Append-only JSONL session log
//!
//! Every mutation of the chat session is one line: a message, a thread
//! change, or a history clear. Loading replays the log. Two processes
//! sharing a log interleave whole lines; the last `thread` entry wins.
//! Appends and compaction hold an advisory lock on a sidecar file and
//! every append reopens the log, so entries written by one process
//! survive a compaction by the other.

use fs2::FileExt;
use relay_agent::{SessionStore, StoredSession};
use relay_ai::{Message, ThreadId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Dead entries tolerated before the log is rewritten
const COMPACT_MIN_DEAD: usize = 64;

/// Session entry types for JSONL format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEntry {
    /// A message in the conversation
    Message { message: Message, timestamp: i64 },
    /// The session was bound to a thread
    Thread { thread_id: ThreadId, timestamp: i64 },
    /// The history was cleared
    Cleared { timestamp: i64 },
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Result of replaying a log
#[derive(Debug, Default)]
struct Replay {
    messages: Vec<(Message, i64)>,
    thread: Option<(ThreadId, i64)>,
    entries: usize,
}

impl Replay {
    fn trim(&mut self, max: Option<usize>) {
        if let Some(max) = max {
            if self.messages.len() > max {
                let excess = self.messages.len() - max;
                self.messages.drain(..excess);
            }
        }
    }

    fn live(&self) -> usize {
        self.messages.len() + usize::from(self.thread.is_some())
    }

    fn into_stored(self) -> StoredSession {
        StoredSession {
            messages: self.messages.into_iter().map(|(m, _)| m).collect(),
            thread_id: self.thread.map(|(t, _)| t),
        }
    }
}

/// Exclusive advisory lock, released when dropped
struct LogLock(File);

impl Drop for LogLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// [`SessionStore`] backed by an append-only JSONL file
pub struct JsonlStore {
    path: PathBuf,
    lock_path: PathBuf,
    max_history: Option<usize>,
    compaction: bool,
    /// Lines currently in the file
    entries: usize,
    /// Messages the log currently retains
    messages: usize,
    has_thread: bool,
}

impl JsonlStore {
    /// Open (or prepare to create) the log at `path`
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            lock_path: path.with_extension("jsonl.lock"),
            path,
            max_history: None,
            compaction: true,
            entries: 0,
            messages: 0,
            has_thread: false,
        })
    }

    /// Retain only the last `max` messages
    pub fn with_max_history(mut self, max: Option<usize>) -> Self {
        self.max_history = max;
        self
    }

    /// Never rewrite the log; for read-only views of the history
    pub fn without_compaction(mut self) -> Self {
        self.compaction = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> io::Result<LogLock> {
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        Ok(LogLock(file))
    }

    fn replay(&self) -> io::Result<Replay> {
        let mut replay = Replay::default();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(replay),
            Err(e) => return Err(e),
        };

        // Raw lines: a torn or corrupted write must not hide the rest of the log
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_no = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;
            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            replay.entries += 1;

            match serde_json::from_slice::<LogEntry>(line) {
                Ok(LogEntry::Message { message, timestamp }) => {
                    replay.messages.push((message, timestamp))
                }
                Ok(LogEntry::Thread {
                    thread_id,
                    timestamp,
                }) => replay.thread = Some((thread_id, timestamp)),
                Ok(LogEntry::Cleared { .. }) => replay.messages.clear(),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable entry at {}:{}: {}",
                        self.path.display(),
                        line_no,
                        e
                    );
                }
            }
        }
        Ok(replay)
    }

    fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _lock = self.lock()?;
        // Reopened per entry so a rename by another writer is picked up
        let mut file = File::options()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        self.entries += 1;
        Ok(())
    }

    fn dead(&self) -> usize {
        let retained = match self.max_history {
            Some(max) => self.messages.min(max),
            None => self.messages,
        };
        let live = retained + usize::from(self.has_thread);
        self.entries.saturating_sub(live)
    }

    fn maybe_compact(&mut self) -> io::Result<()> {
        if !self.compaction {
            return Ok(());
        }
        let dead = self.dead();
        if dead >= COMPACT_MIN_DEAD && dead > self.entries - dead {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite the log so it holds only the live state.
    ///
    /// The new log is written beside the old one and renamed over it while
    /// the lock is held.
    pub fn compact(&mut self) -> io::Result<()> {
        let _lock = self.lock()?;
        let mut replay = self.replay()?;
        replay.trim(self.max_history);
        let before = replay.entries;

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            if let Some((ref thread_id, timestamp)) = replay.thread {
                let entry = LogEntry::Thread {
                    thread_id: thread_id.clone(),
                    timestamp,
                };
                writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
            }
            for (message, timestamp) in &replay.messages {
                let entry = LogEntry::Message {
                    message: message.clone(),
                    timestamp: *timestamp,
                };
                writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.entries = replay.live();
        self.messages = replay.messages.len();
        self.has_thread = replay.thread.is_some();
        tracing::debug!(before, after = self.entries, "compacted session log");
        Ok(())
    }
}

impl SessionStore for JsonlStore {
    fn load(&mut self) -> io::Result<StoredSession> {
        let mut replay = self.replay()?;
        self.entries = replay.entries;
        self.messages = replay.messages.len();
        self.has_thread = replay.thread.is_some();
        self.maybe_compact()?;

        replay.trim(self.max_history);
        Ok(replay.into_stored())
    }

    fn append_message(&mut self, message: &Message) -> io::Result<()> {
        self.append(&LogEntry::Message {
            message: message.clone(),
            timestamp: now_millis(),
        })?;
        self.messages += 1;
        self.maybe_compact()
    }

    fn set_thread(&mut self, thread: &ThreadId) -> io::Result<()> {
        self.append(&LogEntry::Thread {
            thread_id: thread.clone(),
            timestamp: now_millis(),
        })?;
        self.has_thread = true;
        self.maybe_compact()
    }

    fn clear_history(&mut self) -> io::Result<()> {
        self.append(&LogEntry::Cleared {
            timestamp: now_millis(),
        })?;
        self.messages = 0;
        self.maybe_compact()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_agent::Session;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> JsonlStore {
        JsonlStore::open(dir.path().join("history.jsonl")).unwrap()
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let loaded = store(&dir).load().unwrap();
        assert_eq!(loaded, StoredSession::default());
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = Session::open(Box::new(store(&dir))).unwrap();
            session.bind_thread(ThreadId::new("thread_1")).unwrap();
            session.push(Message::user("Hello")).unwrap();
            session.push(Message::assistant("Hi there")).unwrap();
        }

        let reopened = Session::open(Box::new(store(&dir))).unwrap();
        assert_eq!(
            reopened.history(),
            &[Message::user("Hello"), Message::assistant("Hi there")]
        );
        assert_eq!(reopened.thread(), Some(&ThreadId::new("thread_1")));
    }

    #[test]
    fn test_each_mutation_appends_one_line() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        log.append_message(&Message::user("a")).unwrap();
        log.set_thread(&ThreadId::new("thread_1")).unwrap();
        log.append_message(&Message::assistant("b")).unwrap();
        log.clear_history().unwrap();
        assert_eq!(line_count(log.path()), 4);
    }

    #[test]
    fn test_replay_honours_cleared_and_latest_thread() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        log.append_message(&Message::user("old")).unwrap();
        log.set_thread(&ThreadId::new("thread_1")).unwrap();
        log.clear_history().unwrap();
        log.append_message(&Message::user("new")).unwrap();
        log.set_thread(&ThreadId::new("thread_2")).unwrap();

        let loaded = store(&dir).load().unwrap();
        assert_eq!(loaded.messages, vec![Message::user("new")]);
        assert_eq!(loaded.thread_id, Some(ThreadId::new("thread_2")));
    }

    #[test]
    fn test_unreadable_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        log.append_message(&Message::user("kept")).unwrap();
        let mut file = File::options().append(true).open(log.path()).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file, "{{\"type\":\"mystery\"}}").unwrap();

        let loaded = store(&dir).load().unwrap();
        assert_eq!(loaded.messages, vec![Message::user("kept")]);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        log.append_message(&Message::user("before")).unwrap();
        let mut file = File::options().append(true).open(log.path()).unwrap();
        file.write_all(b"\xff\xfe garbage\n").unwrap();
        log.append_message(&Message::assistant("after")).unwrap();

        let loaded = store(&dir).load().unwrap();
        assert_eq!(
            loaded.messages,
            vec![Message::user("before"), Message::assistant("after")]
        );
    }

    #[test]
    fn test_bounded_history_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        for i in 0..5 {
            log.append_message(&Message::user(format!("m{}", i))).unwrap();
        }

        let loaded = store(&dir).with_max_history(Some(2)).load().unwrap();
        let contents: Vec<_> = loaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[test]
    fn test_compact_preserves_state() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        log.set_thread(&ThreadId::new("thread_1")).unwrap();
        log.append_message(&Message::user("gone")).unwrap();
        log.clear_history().unwrap();
        log.set_thread(&ThreadId::new("thread_2")).unwrap();
        log.append_message(&Message::user("Hello")).unwrap();
        let before = store(&dir).load().unwrap();

        log.compact().unwrap();
        assert_eq!(line_count(log.path()), 2);
        assert_eq!(store(&dir).load().unwrap(), before);

        log.append_message(&Message::assistant("Hi")).unwrap();
        let after = store(&dir).load().unwrap();
        assert_eq!(after.messages.len(), 2);
    }

    #[test]
    fn test_clearing_long_history_compacts_automatically() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        for i in 0..COMPACT_MIN_DEAD {
            log.append_message(&Message::user(format!("m{}", i))).unwrap();
        }
        log.clear_history().unwrap();

        assert_eq!(line_count(log.path()), 0);
        assert_eq!(store(&dir).load().unwrap(), StoredSession::default());
    }

    #[test]
    fn test_second_writer_survives_compaction() {
        let dir = TempDir::new().unwrap();
        let mut first = store(&dir);
        let mut second = store(&dir);
        first.load().unwrap();
        second.load().unwrap();

        second.append_message(&Message::user("from second")).unwrap();
        for i in 0..COMPACT_MIN_DEAD {
            first.append_message(&Message::user(format!("m{}", i))).unwrap();
        }
        first.clear_history().unwrap();
        assert_eq!(line_count(first.path()), 0);

        second.append_message(&Message::user("after compaction")).unwrap();
        first.append_message(&Message::assistant("reply")).unwrap();

        let loaded = store(&dir).load().unwrap();
        assert_eq!(
            loaded.messages,
            vec![Message::user("after compaction"), Message::assistant("reply")]
        );
    }

    #[test]
    fn test_read_only_view_never_rewrites() {
        let dir = TempDir::new().unwrap();
        let mut log = store(&dir);
        for i in 0..COMPACT_MIN_DEAD {
            log.append_message(&Message::user(format!("m{}", i))).unwrap();
        }
        let mut file = File::options().append(true).open(log.path()).unwrap();
        writeln!(file, "{}", serde_json::to_string(&LogEntry::Cleared { timestamp: 0 }).unwrap())
            .unwrap();
        let lines = line_count(log.path());

        let loaded = store(&dir).without_compaction().load().unwrap();
        assert!(loaded.messages.is_empty());
        assert_eq!(line_count(log.path()), lines);
    }
}
