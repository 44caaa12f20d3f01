use std::fmt;

use fxhash::{FxHashMap, FxHashSet};
use log::trace;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    Compute,
}

impl QueueKind {
    const ALL: [Self; 2] = [Self::Graphics, Self::Compute];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceState {
    #[default]
    Common,
    ShaderResource,
    UnorderedAccess,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point on a queue's timeline: "everything dispatched on `queue` so far".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FenceValue {
    pub queue: QueueKind,
    pub value: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub resource: ResourceId,
    pub before: ResourceState,
    pub after: ResourceState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// All transitions required by the next dispatch, flushed at once.
    Barrier {
        queue: QueueKind,
        transitions: Vec<Transition>,
    },

    UavBarrier {
        queue: QueueKind,
        resource: ResourceId,
    },

    Dispatch {
        queue: QueueKind,
        label: String,
    },

    Signal {
        fence: FenceValue,
    },

    Wait {
        queue: QueueKind,
        fence: FenceValue,
    },
}

/// Records the command stream of a frame, tracking resource states so that
/// every dispatch sees its inputs and outputs in the right state.
#[derive(Debug, Default)]
pub struct Schedule {
    states: FxHashMap<ResourceId, ResourceState>,

    /// Queue and position (1-based) of the dispatch that last wrote given
    /// resource.
    writers: FxHashMap<ResourceId, (QueueKind, u64)>,

    /// Number of dispatches recorded so far, per queue.
    dispatched: [u64; 2],

    /// `synced[a][b]` = how many of `b`'s dispatches are known to `a`.
    synced: [[u64; 2]; 2],

    /// Resources written by the latest dispatch, per queue.
    last_writes: [FxHashSet<ResourceId>; 2],

    commands: Vec<Command>,
}

impl Schedule {
    /// Starts recording a new frame; work from the previous frame is assumed
    /// to have completed on all queues.
    pub fn begin_frame(&mut self) {
        self.commands.clear();

        for queue in QueueKind::ALL {
            self.synced[queue.index()] = self.dispatched;
            self.last_writes[queue.index()].clear();
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn state(&self, resource: &ResourceId) -> ResourceState {
        self.states.get(resource).copied().unwrap_or_default()
    }

    /// Records a dispatch that reads `reads` and writes `writes`, preceded by
    /// whatever barriers it needs.
    ///
    /// Fails when any of the resources was last written on another queue
    /// without this queue having waited for that write.
    pub fn dispatch(
        &mut self,
        queue: QueueKind,
        label: impl Into<String>,
        reads: &[&ResourceId],
        writes: &[&ResourceId],
    ) -> Result<()> {
        let label = label.into();

        for &resource in reads.iter().chain(writes) {
            if let Some(&(writer, position)) = self.writers.get(resource) {
                if writer != queue
                    && self.synced[queue.index()][writer.index()] < position
                {
                    return Err(Error::MissingQueueSync {
                        resource: resource.to_string(),
                        queue,
                    });
                }
            }
        }

        let mut transitions = Vec::new();
        let mut uav_barriers = Vec::new();

        let reads = reads
            .iter()
            .filter(|&&resource| !writes.contains(&resource))
            .map(|&resource| (resource, ResourceState::ShaderResource));

        let requests = reads.chain(
            writes
                .iter()
                .map(|&resource| (resource, ResourceState::UnorderedAccess)),
        );

        for (resource, after) in requests {
            let before = self.state(resource);

            if before != after {
                transitions.push(Transition {
                    resource: resource.clone(),
                    before,
                    after,
                });

                self.states.insert(resource.clone(), after);
            } else if after == ResourceState::UnorderedAccess
                && self.last_writes[queue.index()].contains(resource)
            {
                uav_barriers.push(resource.clone());
            }
        }

        if !transitions.is_empty() {
            self.commands.push(Command::Barrier { queue, transitions });
        }

        for resource in uav_barriers {
            self.commands.push(Command::UavBarrier { queue, resource });
        }

        trace!("Dispatching `{label}` on {queue:?}");

        self.commands.push(Command::Dispatch { queue, label });
        self.dispatched[queue.index()] += 1;

        let position = self.dispatched[queue.index()];
        let last_writes = &mut self.last_writes[queue.index()];

        last_writes.clear();

        for &resource in writes {
            self.writers.insert(resource.clone(), (queue, position));
            last_writes.insert(resource.clone());
        }

        Ok(())
    }

    /// Marks everything dispatched on `queue` so far.
    pub fn signal(&mut self, queue: QueueKind) -> FenceValue {
        let fence = FenceValue {
            queue,
            value: self.dispatched[queue.index()],
        };

        self.commands.push(Command::Signal { fence });

        fence
    }

    /// Makes `queue` wait until `fence` gets reached.
    pub fn wait(&mut self, queue: QueueKind, fence: FenceValue) {
        let synced = &mut self.synced[queue.index()][fence.queue.index()];

        *synced = (*synced).max(fence.value);

        self.commands.push(Command::Wait { queue, fence });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatches(schedule: &Schedule) -> Vec<&str> {
        schedule
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::Dispatch { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn transitions_are_batched_before_dispatch() {
        let input = ResourceId::new("input");
        let output = ResourceId::new("output");
        let mut target = Schedule::default();

        target.begin_frame();
        target
            .dispatch(QueueKind::Compute, "pass", &[&input], &[&output])
            .unwrap();

        assert_eq!(
            &[
                Command::Barrier {
                    queue: QueueKind::Compute,
                    transitions: vec![
                        Transition {
                            resource: input.clone(),
                            before: ResourceState::Common,
                            after: ResourceState::ShaderResource,
                        },
                        Transition {
                            resource: output.clone(),
                            before: ResourceState::Common,
                            after: ResourceState::UnorderedAccess,
                        },
                    ],
                },
                Command::Dispatch {
                    queue: QueueKind::Compute,
                    label: "pass".into(),
                },
            ],
            target.commands()
        );

        assert_eq!(ResourceState::UnorderedAccess, target.state(&output));
    }

    #[test]
    fn read_after_write_transitions() {
        let a = ResourceId::new("a");
        let b = ResourceId::new("b");
        let mut target = Schedule::default();

        target.begin_frame();
        target.dispatch(QueueKind::Compute, "1", &[], &[&a]).unwrap();
        target.dispatch(QueueKind::Compute, "2", &[&a], &[&b]).unwrap();

        assert!(matches!(
            &target.commands()[2],
            Command::Barrier { transitions, .. }
                if transitions[0].resource == a
                    && transitions[0].after == ResourceState::ShaderResource
        ));

        assert!(!target
            .commands()
            .iter()
            .any(|command| matches!(command, Command::UavBarrier { .. })));
    }

    #[test]
    fn write_after_write_gets_uav_barrier() {
        let a = ResourceId::new("a");
        let mut target = Schedule::default();

        target.begin_frame();
        target.dispatch(QueueKind::Compute, "1", &[], &[&a]).unwrap();
        target.dispatch(QueueKind::Compute, "2", &[], &[&a]).unwrap();

        assert_eq!(
            Command::UavBarrier {
                queue: QueueKind::Compute,
                resource: a.clone(),
            },
            target.commands()[2]
        );

        assert_eq!(vec!["1", "2"], dispatches(&target));
    }

    #[test]
    fn cross_queue_reads_require_wait() {
        let a = ResourceId::new("a");
        let b = ResourceId::new("b");
        let mut target = Schedule::default();

        target.begin_frame();
        target.dispatch(QueueKind::Graphics, "1", &[], &[&a]).unwrap();

        let err = target
            .dispatch(QueueKind::Compute, "2", &[&a], &[&b])
            .unwrap_err();

        assert!(matches!(
            err,
            Error::MissingQueueSync {
                queue: QueueKind::Compute,
                ..
            }
        ));

        // Rejected dispatches don't get recorded
        assert_eq!(vec!["1"], dispatches(&target));

        let fence = target.signal(QueueKind::Graphics);

        target.wait(QueueKind::Compute, fence);
        target
            .dispatch(QueueKind::Compute, "2", &[&a], &[&b])
            .unwrap();

        assert_eq!(vec!["1", "2"], dispatches(&target));
    }

    #[test]
    fn stale_fence_doesnt_cover_later_writes() {
        let a = ResourceId::new("a");
        let mut target = Schedule::default();

        target.begin_frame();

        let fence = target.signal(QueueKind::Graphics);

        target.dispatch(QueueKind::Graphics, "1", &[], &[&a]).unwrap();
        target.wait(QueueKind::Compute, fence);

        assert!(target.dispatch(QueueKind::Compute, "2", &[&a], &[]).is_err());
    }

    #[test]
    fn new_frame_starts_synchronized() {
        let a = ResourceId::new("a");
        let mut target = Schedule::default();

        target.begin_frame();
        target.dispatch(QueueKind::Graphics, "1", &[], &[&a]).unwrap();
        target.begin_frame();

        assert!(target.commands().is_empty());
        assert!(target.dispatch(QueueKind::Compute, "2", &[&a], &[]).is_ok());
    }
}
