//! In-memory collections of detected objects.

use crate::{
    prelude::*,
    timed::{compare_by_time, Timed, TimedObject},
};

/// Orders objects of a collection.
pub type Comparer<T> = fn(&T, &T) -> Ordering;

/// A change to a `TimedObjectsCollection`, as seen by its observers.
#[derive(Debug)]
pub enum CollectionChange<'a, T> {
    /// Objects were added.
    Added(&'a [T]),
    /// Objects were removed.
    Removed(&'a [T]),
}

type Observer<T> = Box<dyn FnMut(&CollectionChange<T>) + Send>;

/// A mutable collection of objects of one type.
///
/// Objects are stored in insertion order and sorted when iterated, by the collection's comparer
/// (ascending time unless specified otherwise).
/// Sorting is stable, so objects that compare equal keep their insertion order.
pub struct TimedObjectsCollection<T> {
    objects: Vec<T>,
    comparer: Comparer<T>,
    observers: Vec<Observer<T>>,
}
impl<T: Timed> TimedObjectsCollection<T> {
    /// Create an empty collection ordered by time.
    pub fn new() -> TimedObjectsCollection<T> {
        TimedObjectsCollection::with_comparer(compare_by_time::<T>)
    }
}
impl<T> TimedObjectsCollection<T> {
    /// Create an empty collection ordered by a custom comparer.
    pub fn with_comparer(comparer: Comparer<T>) -> TimedObjectsCollection<T> {
        TimedObjectsCollection {
            objects: Vec::new(),
            comparer,
            observers: Vec::new(),
        }
    }

    #[inline]
    pub fn comparer(&self) -> Comparer<T> {
        self.comparer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Register a callback that is run after every change.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&CollectionChange<T>) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, change: &CollectionChange<T>) {
        for observer in &mut self.observers {
            observer(change);
        }
    }

    pub fn add(&mut self, object: T) {
        self.add_range(core::iter::once(object));
    }

    /// Add several objects, notifying observers once.
    pub fn add_range<I: IntoIterator<Item = T>>(&mut self, objects: I) {
        let start = self.objects.len();
        self.objects.extend(objects);
        if self.objects.len() == start || self.observers.is_empty() {
            return;
        }
        let mut observers = mem::take(&mut self.observers);
        for observer in &mut observers {
            observer(&CollectionChange::Added(&self.objects[start..]));
        }
        self.observers = observers;
    }

    /// Remove every object matching the predicate, returning the amount of removed objects.
    pub fn remove_where<F>(&mut self, mut matches: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let (removed, kept): (Vec<T>, Vec<T>) = mem::take(&mut self.objects)
            .into_iter()
            .partition(|obj| matches(obj));
        self.objects = kept;
        if !removed.is_empty() {
            self.notify(&CollectionChange::Removed(&removed));
        }
        removed.len()
    }

    /// Remove all objects.
    pub fn clear(&mut self) {
        self.remove_where(|_| true);
    }

    /// Sort the storage by the comparer.
    pub fn sort(&mut self) {
        let comparer = self.comparer;
        self.objects.sort_by(comparer);
    }

    /// Iterate over the objects in comparer order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut sorted: Vec<&T> = self.objects.iter().collect();
        sorted.sort_by(|a, b| (self.comparer)(a, b));
        sorted.into_iter()
    }

    /// Iterate mutably over the objects in comparer order.
    pub fn iter_mut(&mut self) -> core::slice::IterMut<T> {
        self.sort();
        self.objects.iter_mut()
    }

    /// Take all objects out of the collection, in comparer order.
    pub fn into_vec(mut self) -> Vec<T> {
        self.sort();
        mem::take(&mut self.objects)
    }
}
impl<T: Timed> Default for TimedObjectsCollection<T> {
    fn default() -> TimedObjectsCollection<T> {
        TimedObjectsCollection::new()
    }
}
impl<T: Timed> core::iter::FromIterator<T> for TimedObjectsCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(objects: I) -> TimedObjectsCollection<T> {
        let mut collection = TimedObjectsCollection::new();
        collection.objects.extend(objects);
        collection
    }
}
impl<T> Extend<T> for TimedObjectsCollection<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, objects: I) {
        self.add_range(objects);
    }
}
impl<T: fmt::Debug> fmt::Debug for TimedObjectsCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TimedObjectsCollection")
            .field("objects", &self.objects)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Handle to an object of an `ObservableTimedObjectsCollection`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct ObjectId(u64);

/// An object that was moved, along with where it was before.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct ChangedObject {
    pub id: ObjectId,
    pub old_time: u64,
}

/// The net effect of a change, or of a batch of changes, to an
/// `ObservableTimedObjectsCollection`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ObservableChange {
    /// Objects that were added and are still there.
    pub added: Vec<ObjectId>,
    /// Objects that were there before and were removed.
    pub removed: Vec<(ObjectId, TimedObject)>,
    /// Objects that were there before, are still there, and were changed.
    pub changed: Vec<ChangedObject>,
}
impl ObservableChange {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    fn record_added(&mut self, id: ObjectId) {
        self.added.push(id);
    }

    fn record_removed(&mut self, id: ObjectId, object: TimedObject) {
        self.changed.retain(|changed| changed.id != id);
        let before = self.added.len();
        self.added.retain(|added| *added != id);
        if self.added.len() == before {
            self.removed.push((id, object));
        }
    }

    fn record_changed(&mut self, id: ObjectId, old_time: u64) {
        if !self.changed.iter().any(|changed| changed.id == id) {
            self.changed.push(ChangedObject { id, old_time });
        }
    }
}

/// A collection of objects of any type that reports what changes in it.
///
/// Changes made inside `change_collection` are reported once, as their net effect: an object
/// added and removed in the same batch is not reported at all, and a removed object is never
/// reported as changed.
/// Batches can be nested, inner batches being part of the outermost one.
pub struct ObservableTimedObjectsCollection {
    objects: Vec<(ObjectId, TimedObject)>,
    next_id: u64,
    batch_depth: usize,
    batch: ObservableChange,
    observers: Vec<Box<dyn FnMut(&ObservableChange) + Send>>,
}
impl ObservableTimedObjectsCollection {
    pub fn new() -> ObservableTimedObjectsCollection {
        ObservableTimedObjectsCollection {
            objects: Vec::new(),
            next_id: 0,
            batch_depth: 0,
            batch: ObservableChange::default(),
            observers: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Register a callback that is run after every change, or after every outermost batch.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&ObservableChange) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn get(&self, id: ObjectId) -> Option<&TimedObject> {
        self.objects
            .iter()
            .find(|(obj_id, _)| *obj_id == id)
            .map(|(_, obj)| obj)
    }

    /// Iterate over the objects in time order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &TimedObject)> + '_ {
        let mut sorted: Vec<(ObjectId, &TimedObject)> =
            self.objects.iter().map(|(id, obj)| (*id, obj)).collect();
        sorted.sort_by(|(_, a), (_, b)| compare_by_time(*a, *b));
        sorted.into_iter()
    }

    pub fn add(&mut self, object: TimedObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push((id, object));
        self.record(|change| change.record_added(id));
        id
    }

    /// Add several objects, reporting them as a single change.
    pub fn add_range<I: IntoIterator<Item = TimedObject>>(&mut self, objects: I) -> Vec<ObjectId> {
        self.change_collection(|collection| {
            objects
                .into_iter()
                .map(|obj| collection.add(obj))
                .collect()
        })
    }

    /// Remove an object, returning whether it was present.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let pos = match self.objects.iter().position(|(obj_id, _)| *obj_id == id) {
            Some(pos) => pos,
            None => return false,
        };
        let (_, object) = self.objects.remove(pos);
        self.record(|change| change.record_removed(id, object));
        true
    }

    /// Remove all objects, reporting them as a single change.
    pub fn clear(&mut self) {
        let ids: Vec<ObjectId> = self.objects.iter().map(|(id, _)| *id).collect();
        self.change_collection(|collection| {
            for id in ids {
                collection.remove(id);
            }
        });
    }

    /// Modify an object in place, reporting its previous time.
    ///
    /// Returns `false` if there is no such object.
    pub fn change_object<F>(&mut self, id: ObjectId, change: F) -> bool
    where
        F: FnOnce(&mut TimedObject),
    {
        let object = match self.objects.iter_mut().find(|(obj_id, _)| *obj_id == id) {
            Some((_, object)) => object,
            None => return false,
        };
        let old_time = object.time();
        change(object);
        self.record(|change| change.record_changed(id, old_time));
        true
    }

    /// Run several changes as one batch.
    ///
    /// If `change` panics, the batch is closed anyway and the changes it made so far are not
    /// reported.
    pub fn change_collection<F, R>(&mut self, change: F) -> R
    where
        F: FnOnce(&mut ObservableTimedObjectsCollection) -> R,
    {
        let mut batch = Batch::open(self);
        change(&mut *batch.collection)
    }

    fn record<F: FnOnce(&mut ObservableChange)>(&mut self, record: F) {
        if self.batch_depth > 0 {
            record(&mut self.batch);
        } else {
            let mut change = ObservableChange::default();
            record(&mut change);
            self.emit(&change);
        }
    }

    fn emit(&mut self, change: &ObservableChange) {
        if change.is_empty() {
            return;
        }
        for observer in &mut self.observers {
            observer(change);
        }
    }
}
/// Keeps a batch open while alive.
struct Batch<'c> {
    collection: &'c mut ObservableTimedObjectsCollection,
}
impl<'c> Batch<'c> {
    fn open(collection: &'c mut ObservableTimedObjectsCollection) -> Batch<'c> {
        collection.batch_depth += 1;
        Batch { collection }
    }
}
impl Drop for Batch<'_> {
    fn drop(&mut self) {
        let collection = &mut *self.collection;
        collection.batch_depth -= 1;
        if collection.batch_depth > 0 {
            return;
        }
        let batch = mem::take(&mut collection.batch);
        if std::thread::panicking() {
            tracing::warn!(
                added = batch.added.len(),
                removed = batch.removed.len(),
                changed = batch.changed.len(),
                "discarding a batch of changes interrupted by a panic"
            );
            return;
        }
        collection.emit(&batch);
    }
}

impl Default for ObservableTimedObjectsCollection {
    fn default() -> ObservableTimedObjectsCollection {
        ObservableTimedObjectsCollection::new()
    }
}
impl fmt::Debug for ObservableTimedObjectsCollection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ObservableTimedObjectsCollection")
            .field("objects", &self.objects)
            .field("batch_depth", &self.batch_depth)
            .field("observers", &self.observers.len())
            .finish()
    }
}
