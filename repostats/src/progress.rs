use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Shared page counter published to an optional channel.
///
/// The channel is unbounded so publishing never blocks a walker. The sender is
/// dropped together with the reporter, which closes the channel on every exit
/// path and lets receivers iterating over it terminate.
#[derive(Debug, Default)]
pub struct Progress {
    pages: Mutex<usize>,
    sender: Option<UnboundedSender<usize>>,
}

impl Progress {
    pub fn new(sender: Option<UnboundedSender<usize>>) -> Self {
        Progress {
            pages: Mutex::new(0),
            sender,
        }
    }

    pub fn channel() -> (Self, UnboundedReceiver<usize>) {
        let (sender, receiver) = unbounded_channel();
        (Progress::new(Some(sender)), receiver)
    }

    /// Counts one fetched page and publishes the new count.
    pub fn page_done(&self) -> usize {
        let mut pages = self.pages.lock();
        *pages += 1;
        if let Some(sender) = &self.sender {
            // Receiver gone just means nobody is watching anymore.
            let _ = sender.send(*pages);
        }
        *pages
    }

    pub fn pages(&self) -> usize {
        *self.pages.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_increasing_counts_and_closes_on_drop() {
        let (progress, mut receiver) = Progress::channel();
        progress.page_done();
        progress.page_done();
        drop(progress);

        let mut seen = Vec::new();
        while let Some(pages) = receiver.recv().await {
            seen.push(pages);
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn counts_without_a_channel() {
        let progress = Progress::default();
        assert_eq!(progress.page_done(), 1);
        assert_eq!(progress.pages(), 1);
    }
}
