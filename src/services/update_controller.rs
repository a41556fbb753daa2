//! 更新发布状态机
//!
//! `NoUpdate → WaitingForActivation → Activating → Done`，
//! 每次激活最多触发一次整页重载

use tracing::{debug, info};

use crate::worker::{ControlMessage, WorkerEvent};

/// 更新状态
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateState {
    #[default]
    NoUpdate,
    WaitingForActivation { generation: String },
    Activating { generation: String },
    Done { generation: String },
}

/// 需要展示层执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    /// 提示用户有新版本可用
    ShowBanner { generation: String },
    /// 新版本已接管，执行一次重载
    Reload { generation: String },
}

/// 更新控制器
#[derive(Debug, Default)]
pub struct UpdateController {
    state: UpdateState,
    last_reload: Option<String>,
}

impl UpdateController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// 等待激活的代（若有）
    pub fn pending(&self) -> Option<&str> {
        match &self.state {
            UpdateState::WaitingForActivation { generation } => Some(generation),
            _ => None,
        }
    }

    /// 处理 worker 事件
    ///
    /// # 返回
    /// 需要展示层执行的动作；同一代的重复事件不会产生第二次重载
    pub fn on_worker_event(&mut self, event: &WorkerEvent) -> Option<UpdateAction> {
        match event {
            WorkerEvent::UpdateReady { generation } => self.on_update_ready(generation),
            WorkerEvent::ControllerChange { generation } => self.on_controller_change(generation),
            WorkerEvent::CacheVersion { .. } => None,
        }
    }

    fn on_update_ready(&mut self, generation: &str) -> Option<UpdateAction> {
        match &self.state {
            UpdateState::WaitingForActivation { generation: waiting } if waiting == generation => None,
            UpdateState::Activating { generation: activating } if activating == generation => None,
            // SKIP_WAITING 尚未处理时又装好了更新的一代：worker 只会激活当前等待的那一代
            UpdateState::Activating { generation: activating } => {
                debug!("激活 {} 期间收到新版本 {}，改为等待其接管", activating, generation);
                self.state = UpdateState::Activating {
                    generation: generation.to_string(),
                };
                None
            }
            _ => {
                info!("🆕 新版本 {} 已就绪，等待激活", generation);
                self.state = UpdateState::WaitingForActivation {
                    generation: generation.to_string(),
                };
                Some(UpdateAction::ShowBanner {
                    generation: generation.to_string(),
                })
            }
        }
    }

    fn on_controller_change(&mut self, generation: &str) -> Option<UpdateAction> {
        let expected = match &self.state {
            UpdateState::WaitingForActivation { generation: g } | UpdateState::Activating { generation: g } => g,
            // 首次安装接管，或本轮已完成
            UpdateState::NoUpdate | UpdateState::Done { .. } => {
                debug!("忽略 CONTROLLER_CHANGE ({})", generation);
                return None;
            }
        };
        if expected != generation {
            debug!("CONTROLLER_CHANGE {} 与等待中的 {} 不符，忽略", generation, expected);
            return None;
        }

        self.state = UpdateState::Done {
            generation: generation.to_string(),
        };
        if self.last_reload.as_deref() == Some(generation) {
            return None;
        }
        self.last_reload = Some(generation.to_string());
        info!("🔄 新版本 {} 已接管，重新加载", generation);
        Some(UpdateAction::Reload {
            generation: generation.to_string(),
        })
    }

    /// 用户选择"立即更新"
    ///
    /// # 返回
    /// 需要发给 worker 的控制消息；没有等待中的版本时返回 `None`
    pub fn request_activation(&mut self) -> Option<ControlMessage> {
        let UpdateState::WaitingForActivation { generation } = &self.state else {
            return None;
        };
        self.state = UpdateState::Activating {
            generation: generation.clone(),
        };
        Some(ControlMessage::SkipWaiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(g: &str) -> WorkerEvent {
        WorkerEvent::UpdateReady {
            generation: g.to_string(),
        }
    }

    fn change(g: &str) -> WorkerEvent {
        WorkerEvent::ControllerChange {
            generation: g.to_string(),
        }
    }

    #[test]
    fn test_full_cycle_reloads_once() {
        let mut controller = UpdateController::new();
        assert_eq!(controller.state(), &UpdateState::NoUpdate);
        assert_eq!(controller.request_activation(), None);

        assert_eq!(
            controller.on_worker_event(&ready("g2")),
            Some(UpdateAction::ShowBanner {
                generation: "g2".to_string()
            })
        );
        assert_eq!(controller.pending(), Some("g2"));

        assert_eq!(controller.request_activation(), Some(ControlMessage::SkipWaiting));
        assert!(matches!(controller.state(), UpdateState::Activating { .. }));
        assert_eq!(controller.request_activation(), None);

        assert_eq!(
            controller.on_worker_event(&change("g2")),
            Some(UpdateAction::Reload {
                generation: "g2".to_string()
            })
        );
        assert_eq!(controller.on_worker_event(&change("g2")), None);
        assert_eq!(
            controller.state(),
            &UpdateState::Done {
                generation: "g2".to_string()
            }
        );
    }

    #[test]
    fn test_first_install_takeover_is_ignored() {
        let mut controller = UpdateController::new();
        assert_eq!(controller.on_worker_event(&change("g1")), None);
        assert_eq!(controller.state(), &UpdateState::NoUpdate);
    }

    #[test]
    fn test_duplicate_ready_shows_banner_once() {
        let mut controller = UpdateController::new();
        assert!(controller.on_worker_event(&ready("g2")).is_some());
        assert_eq!(controller.on_worker_event(&ready("g2")), None);
    }

    #[test]
    fn test_new_cycle_after_done() {
        let mut controller = UpdateController::new();
        controller.on_worker_event(&ready("g2"));
        controller.request_activation();
        controller.on_worker_event(&change("g2"));

        assert!(controller.on_worker_event(&ready("g3")).is_some());
        // worker 自行激活（未经 request_activation）同样完成一轮
        assert_eq!(
            controller.on_worker_event(&change("g3")),
            Some(UpdateAction::Reload {
                generation: "g3".to_string()
            })
        );
    }

    #[test]
    fn test_newer_install_during_activation_still_reloads() {
        let mut controller = UpdateController::new();
        controller.on_worker_event(&ready("g2"));
        assert_eq!(controller.request_activation(), Some(ControlMessage::SkipWaiting));

        // g3 在 SKIP_WAITING 之前装好，替换了等待中的 g2
        assert_eq!(controller.on_worker_event(&ready("g3")), None);
        assert_eq!(
            controller.state(),
            &UpdateState::Activating {
                generation: "g3".to_string()
            }
        );

        assert_eq!(
            controller.on_worker_event(&change("g3")),
            Some(UpdateAction::Reload {
                generation: "g3".to_string()
            })
        );
        assert_eq!(controller.on_worker_event(&change("g3")), None);
        assert_eq!(
            controller.state(),
            &UpdateState::Done {
                generation: "g3".to_string()
            }
        );
    }

    #[test]
    fn test_mismatched_takeover_is_ignored() {
        let mut controller = UpdateController::new();
        controller.on_worker_event(&ready("g2"));
        controller.request_activation();
        assert_eq!(controller.on_worker_event(&change("g9")), None);
        assert!(matches!(controller.state(), UpdateState::Activating { .. }));
    }
}
