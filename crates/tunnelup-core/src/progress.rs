use tokio::sync::mpsc;

/// Coarse progress events for a host that wants to display the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateProgress {
    Checking,
    Downloading { downloaded: u64, total: u64 },
    Verifying,
    Disconnecting,
    Installing,
}

// Lossy: a slow or closed receiver never stalls the run.
pub(crate) fn report(progress: Option<&mpsc::Sender<UpdateProgress>>, event: UpdateProgress) {
    if let Some(sender) = progress {
        let _ = sender.try_send(event);
    }
}
