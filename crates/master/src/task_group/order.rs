use std::cmp::Ordering;

use scheduler_config::TaskGroupQueueOrder;
use scheduler_domain::entities::TaskGroupQueue;

/// 容量不足时等待队列的准入顺序
pub fn compare_queue(order: TaskGroupQueueOrder, a: &TaskGroupQueue, b: &TaskGroupQueue) -> Ordering {
    match order {
        TaskGroupQueueOrder::PriorityDescThenId => b
            .priority
            .cmp(&a.priority)
            .then_with(|| a.create_time.cmp(&b.create_time))
            .then_with(|| a.id.cmp(&b.id)),
        TaskGroupQueueOrder::IdAsc => a.id.cmp(&b.id),
    }
}

pub fn sort_waiting_queue(order: TaskGroupQueueOrder, queues: &mut [TaskGroupQueue]) {
    queues.sort_by(|a, b| compare_queue(order, a, b));
}
