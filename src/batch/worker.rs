//! Runs a batch on a background thread so a front end stays responsive.

use crate::batch::listener::ChannelListener;
use crate::batch::report::BatchReport;
use crate::batch::run_batch;
use crate::config::Config;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerEvent {
    Log(String),
    Progress(u8),
    /// Last event of a run; `Err` carries a batch-level failure such as an unreadable boundary file.
    Finished(Result<BatchReport, String>),
}

pub struct BatchWorker {
    events: Receiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl BatchWorker {
    pub fn spawn(inputs: Vec<PathBuf>, output_root: PathBuf, config: Config) -> Self {
        let (sender, events) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            let listener = ChannelListener::new(sender.clone());
            let result = run_batch(&inputs, &output_root, &config, &listener, &flag).map_err(|e| e.to_string());
            let _ = sender.send(WorkerEvent::Finished(result));
        });
        Self { events, cancel, handle }
    }

    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    /// Asks the run to stop before the next workbook. The current workbook always completes.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Blocks until the run has finished and returns its report. Log and
    /// progress events are handed to `observe` as they arrive.
    pub fn wait(self, mut observe: impl FnMut(&WorkerEvent)) -> Result<BatchReport, String> {
        let mut finished = None;
        for event in self.events.iter() {
            match event {
                WorkerEvent::Finished(result) => finished = Some(result),
                event => observe(&event),
            }
        }
        let _ = self.handle.join();
        finished.unwrap_or_else(|| Err("batch worker stopped unexpectedly".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn worker_reports_and_finishes() {
        let dir = tempdir().unwrap();
        let worker = BatchWorker::spawn(Vec::new(), dir.path().join("out"), Config::default());
        let mut progress = Vec::new();
        let report = worker
            .wait(|event| {
                if let WorkerEvent::Progress(percent) = event {
                    progress.push(*percent);
                }
            })
            .unwrap();
        assert!(report.workbooks.is_empty());
        assert!(!report.cancelled);
        assert_eq!(progress, vec![0, 100]);
    }

    #[test]
    fn cancelled_before_start_skips_workbooks() {
        let dir = tempdir().unwrap();
        let inputs = vec![dir.path().join("a.xlsx"), dir.path().join("b.xlsx")];
        let (sender, events) = mpsc::channel();
        let listener = ChannelListener::new(sender);
        let flag = AtomicBool::new(true);
        let report = run_batch(&inputs, &dir.path().join("out"), &Config::default(), &listener, &flag).unwrap();
        assert!(report.cancelled);
        assert!(report.workbooks.is_empty());
        drop(listener);
        assert!(events.iter().any(|event| matches!(event, WorkerEvent::Log(_))));
    }
}
