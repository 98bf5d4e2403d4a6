use crate::error::{Error, IoContext, Result};
use std::io::Read;
use std::process::{Child, ExitStatus};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::warn;

const POLL: Duration = Duration::from_millis(50);

pub(crate) struct Finished {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl Finished {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Wait for `child`, draining its pipes and calling `on_tick(elapsed)` while it runs.
///
/// With a `timeout`, the child is killed once it is exceeded and the result
/// comes back with `timed_out` set.
pub(crate) fn wait_with_ticks(
    child: &mut Child,
    timeout: Option<Duration>,
    on_tick: &mut dyn FnMut(Duration),
) -> Result<Finished> {
    // Drain pipes while waiting so chatty children can't block on a full buffer.
    let stdout_thread = drain(child.stdout.take());
    let stderr_thread = drain(child.stderr.take());

    let start = Instant::now();
    let (status, timed_out) = loop {
        if let Some(status) = child.try_wait().io_context(|| "try_wait")? {
            break (status, false);
        }
        let elapsed = start.elapsed();
        if timeout.is_some_and(|t| elapsed > t) {
            warn!("subprocess timed out after {:?}", elapsed);
            let _ = child.kill();
            let status = child.wait().io_context(|| "wait after kill")?;
            break (status, true);
        }
        on_tick(elapsed);
        std::thread::sleep(POLL);
    };

    Ok(Finished {
        status,
        stdout: join(stdout_thread, "stdout")?,
        stderr: join(stderr_thread, "stderr")?,
        timed_out,
        elapsed: start.elapsed(),
    })
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            r.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: JoinHandle<std::io::Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| Error::io(format!("{name} reader"), std::io::Error::other("reader thread panicked")))?
        .io_context(|| format!("read {name}"))
}
