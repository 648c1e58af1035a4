//! 深度计数表。
//!
//! 每个深度槽记录该深度上可从根组合体到达的图元数量（含按种类的子计数），
//! 并增量维护当前最小/最大占用深度。只有边界深度被清空时才会扫描整张表；
//! 批量区段内的扫描与范围变化通知推迟到最外层区段结束。

use tracing::debug;

use crate::entity::{Depth, MAX_DEPTH, ObjectKind};
use crate::errors::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRange {
    pub min: Depth,
    pub max: Depth,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthSlot {
    count: usize,
    per_kind: [usize; 5],
}

impl DepthSlot {
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn count_of(&self, kind: ObjectKind) -> usize {
        kind.primitive_index().map_or(0, |index| self.per_kind[index])
    }
}

#[derive(Debug, Clone)]
pub struct DepthTable {
    slots: Vec<DepthSlot>,
    range: Option<DepthRange>,
    bulk: u32,
    rescan_pending: bool,
    reported: Option<DepthRange>,
}

impl DepthTable {
    pub fn new() -> Self {
        Self {
            slots: vec![DepthSlot::default(); usize::from(MAX_DEPTH) + 1],
            range: None,
            bulk: 0,
            rescan_pending: false,
            reported: None,
        }
    }

    fn slot_index(kind: ObjectKind, depth: Depth) -> Result<(usize, usize), CoreError> {
        let kind_index = kind.primitive_index().ok_or_else(|| {
            CoreError::InvariantViolation("compounds do not occupy a depth".to_string())
        })?;
        if depth > MAX_DEPTH {
            return Err(CoreError::DepthOutOfRange(i64::from(depth)));
        }
        Ok((usize::from(depth), kind_index))
    }

    pub fn add(&mut self, kind: ObjectKind, depth: Depth) -> Result<(), CoreError> {
        let (index, kind_index) = Self::slot_index(kind, depth)?;
        let slot = &mut self.slots[index];
        slot.count += 1;
        slot.per_kind[kind_index] += 1;
        self.range = Some(match self.range {
            None => DepthRange {
                min: depth,
                max: depth,
            },
            Some(range) => DepthRange {
                min: range.min.min(depth),
                max: range.max.max(depth),
            },
        });
        Ok(())
    }

    /// 计数归零且该深度是当前边界时重新确定范围。
    pub fn remove(&mut self, kind: ObjectKind, depth: Depth) -> Result<(), CoreError> {
        let (index, kind_index) = Self::slot_index(kind, depth)?;
        let slot = &mut self.slots[index];
        if slot.count == 0 || slot.per_kind[kind_index] == 0 {
            return Err(CoreError::InvariantViolation(format!(
                "depth count underflow for {kind} at depth {depth}"
            )));
        }
        slot.count -= 1;
        slot.per_kind[kind_index] -= 1;
        if slot.count == 0 {
            let on_boundary = self
                .range
                .is_some_and(|range| range.min == depth || range.max == depth);
            if on_boundary {
                if self.bulk > 0 {
                    self.rescan_pending = true;
                } else {
                    self.rescan();
                }
            }
        }
        Ok(())
    }

    pub fn begin_bulk(&mut self) {
        self.bulk += 1;
    }

    pub fn end_bulk(&mut self) {
        self.bulk = self.bulk.saturating_sub(1);
        if self.bulk == 0 && self.rescan_pending {
            self.rescan();
        }
    }

    #[inline]
    pub fn in_bulk(&self) -> bool {
        self.bulk > 0
    }

    fn rescan(&mut self) {
        let min = self.slots.iter().position(|slot| slot.count > 0);
        let max = self.slots.iter().rposition(|slot| slot.count > 0);
        self.range = match (min, max) {
            (Some(min), Some(max)) => Some(DepthRange {
                min: min as Depth,
                max: max as Depth,
            }),
            _ => None,
        };
        self.rescan_pending = false;
        debug!(range = ?self.range, "重新扫描深度范围");
    }

    pub fn count(&self, depth: Depth) -> usize {
        self.slots.get(usize::from(depth)).map_or(0, DepthSlot::count)
    }

    pub fn count_of(&self, kind: ObjectKind, depth: Depth) -> usize {
        self.slots
            .get(usize::from(depth))
            .map_or(0, |slot| slot.count_of(kind))
    }

    #[inline]
    pub fn range(&self) -> Option<DepthRange> {
        self.range
    }

    #[inline]
    pub fn min(&self) -> Option<Depth> {
        self.range.map(|range| range.min)
    }

    #[inline]
    pub fn max(&self) -> Option<Depth> {
        self.range.map(|range| range.max)
    }

    pub fn total(&self) -> usize {
        self.slots.iter().map(DepthSlot::count).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }

    /// 按深度升序列出被占用的槽位。
    pub fn occupied(&self) -> impl Iterator<Item = (Depth, &DepthSlot)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.count > 0)
            .map(|(depth, slot)| (depth as Depth, slot))
    }

    /// 自上次调用以来范围有变化时返回新范围；批量区段内不报告。
    pub fn take_range_change(&mut self) -> Option<Option<DepthRange>> {
        if self.bulk > 0 || self.range == self.reported {
            return None;
        }
        self.reported = self.range;
        Some(self.range)
    }

    /// 与另一张表逐槽比较，返回第一处差异的描述。
    pub(crate) fn first_mismatch(&self, expected: &DepthTable) -> Option<String> {
        for (depth, (actual, wanted)) in self.slots.iter().zip(&expected.slots).enumerate() {
            if actual != wanted {
                return Some(format!(
                    "depth {depth}: table holds {}, document holds {}",
                    actual.count, wanted.count
                ));
            }
        }
        if !self.rescan_pending && self.range != expected.range {
            return Some(format!(
                "depth range {:?} differs from occupied range {:?}",
                self.range, expected.range
            ));
        }
        None
    }
}

impl Default for DepthTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_removal_rescans_range() {
        let mut table = DepthTable::new();
        table.add(ObjectKind::Line, 5).unwrap();
        assert_eq!(table.count(5), 1);
        assert_eq!(table.range(), Some(DepthRange { min: 5, max: 5 }));

        table.add(ObjectKind::Line, 3).unwrap();
        assert_eq!((table.min(), table.max()), (Some(3), Some(5)));

        table.remove(ObjectKind::Line, 3).unwrap();
        assert_eq!((table.min(), table.max()), (Some(5), Some(5)));

        table.remove(ObjectKind::Line, 5).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn sub_counts_track_each_kind() {
        let mut table = DepthTable::new();
        table.add(ObjectKind::Arc, 40).unwrap();
        table.add(ObjectKind::Text, 40).unwrap();
        table.add(ObjectKind::Text, 40).unwrap();
        assert_eq!(table.count(40), 3);
        assert_eq!(table.count_of(ObjectKind::Text, 40), 2);
        assert_eq!(table.count_of(ObjectKind::Line, 40), 0);

        let err = table.remove(ObjectKind::Line, 40).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation(_)));
        assert_eq!(table.count(40), 3);
    }

    #[test]
    fn out_of_range_depth_is_rejected() {
        let mut table = DepthTable::new();
        assert_eq!(
            table.add(ObjectKind::Line, MAX_DEPTH + 1),
            Err(CoreError::DepthOutOfRange(1000))
        );
        assert!(table.add(ObjectKind::Compound, 10).is_err());
    }

    #[test]
    fn bulk_section_defers_rescan_and_notification() {
        let mut table = DepthTable::new();
        for depth in [2, 4, 6] {
            table.add(ObjectKind::Ellipse, depth).unwrap();
        }
        assert_eq!(table.take_range_change(), Some(Some(DepthRange { min: 2, max: 6 })));
        assert_eq!(table.take_range_change(), None);

        table.begin_bulk();
        table.remove(ObjectKind::Ellipse, 2).unwrap();
        table.remove(ObjectKind::Ellipse, 6).unwrap();
        assert_eq!(table.take_range_change(), None);
        table.end_bulk();

        assert_eq!(table.range(), Some(DepthRange { min: 4, max: 4 }));
        assert_eq!(table.take_range_change(), Some(Some(DepthRange { min: 4, max: 4 })));
        let occupied: Vec<_> = table.occupied().map(|(depth, slot)| (depth, slot.count())).collect();
        assert_eq!(occupied, vec![(4, 1)]);
    }
}
