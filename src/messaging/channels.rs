// Communication channels lock-free

use crate::messaging::command::{EngineCommand, EngineNotice};
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type EngineCommandProducer = ringbuf::HeapProd<EngineCommand>;
pub type EngineCommandConsumer = ringbuf::HeapCons<EngineCommand>;

pub fn create_engine_channel(capacity: usize) -> (EngineCommandProducer, EngineCommandConsumer) {
    let rb = HeapRb::<EngineCommand>::new(capacity);
    rb.split()
}

pub type NoticeProducer = ringbuf::HeapProd<EngineNotice>;
pub type NoticeConsumer = ringbuf::HeapCons<EngineNotice>;

pub fn create_notice_channel(capacity: usize) -> (NoticeProducer, NoticeConsumer) {
    let rb = HeapRb::<EngineNotice>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}
