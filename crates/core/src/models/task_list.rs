use std::cmp::Ordering;

use crate::models::task::{NamedTask, Task};
use crate::{SchedulerError, SchedulerResult};

/// 以名称为键、保持插入顺序的任务集合
///
/// 重复添加同名条目时原位替换，不改变其顺序。
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList<T: NamedTask = Task> {
    items: Vec<T>,
}

impl<T: NamedTask> Default for TaskList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: NamedTask> TaskList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: T) {
        match self.position(item.name()) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    pub fn add_all(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.add(item);
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.name() == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        self.position(name).map(|index| self.items.remove(index))
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn walk<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        self.items.iter_mut().for_each(|item| f(item));
    }

    pub fn map<U, F>(&self, f: F) -> Vec<U>
    where
        F: FnMut(&T) -> U,
    {
        self.items.iter().map(f).collect()
    }

    /// 稳定排序，比较结果相等的条目保持原有相对顺序
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.items.sort_by(compare);
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }
}

impl<T: NamedTask + Clone> TaskList<T> {
    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&T) -> bool,
    {
        self.items.iter().filter(|item| predicate(item)).cloned().collect()
    }

    pub fn find_by_name(&self, names: &[&str]) -> Self {
        self.filter(|item| names.contains(&item.name()))
    }

    /// 按给定名称取出子集，一个都找不到时返回错误
    pub fn slice(&self, names: &[&str]) -> SchedulerResult<Self> {
        let sliced = self.find_by_name(names);
        if sliced.is_empty() {
            return Err(SchedulerError::InvalidArgument(format!(
                "找不到任务: {}",
                names.join(", ")
            )));
        }
        Ok(sliced)
    }

    pub fn chunk(&self, size: usize) -> SchedulerResult<Vec<Self>> {
        if size == 0 {
            return Err(SchedulerError::InvalidArgument(
                "分块大小必须大于0".to_string(),
            ));
        }
        Ok(self
            .items
            .chunks(size)
            .map(|chunk| chunk.iter().cloned().collect())
            .collect())
    }
}

impl<T: NamedTask> FromIterator<T> for TaskList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.add_all(iter);
        list
    }
}

impl<T: NamedTask> IntoIterator for TaskList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T: NamedTask> IntoIterator for &'a TaskList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: NamedTask> From<Vec<T>> for TaskList<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}
