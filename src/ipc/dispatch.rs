use log::{debug, error};

use crate::actions::{Action, ActionSink};
use crate::dictation::DictationWorker;

/// Sends one frame's actions to the sink in order. Failures are logged and
/// skipped; the frame loop never stops because a sink call failed.
/// Returns how many calls failed.
pub fn dispatch_actions<K: ActionSink + ?Sized>(
    actions: &[Action],
    sink: &mut K,
    dictation: Option<&DictationWorker>,
) -> usize {
    let mut failures = 0;
    for action in actions {
        if let Action::RequestDictation = action {
            match dictation {
                Some(worker) => {
                    worker.request();
                }
                None => debug!("dictation request ignored: no worker"),
            }
            continue;
        }
        if let Err(e) = sink.apply(action) {
            error!("{} failed: {e}", action.name());
            failures += 1;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{MouseButton, RecordingSink};

    #[test]
    fn failure_does_not_stop_later_actions() {
        let mut sink = RecordingSink::failing(&["volume_up"]);
        let actions = [
            Action::VolumeUp(4),
            Action::RequestDictation,
            Action::Release(MouseButton::Left),
        ];
        assert_eq!(dispatch_actions(&actions, &mut sink, None), 1);
        assert_eq!(
            sink.actions(),
            vec![Action::VolumeUp(4), Action::Release(MouseButton::Left)]
        );
    }
}
