//! Order-preserving parallel reductions over slices
//!
//! Every operation splits its input with [`chunk::split`], reduces each chunk
//! on its own thread, and combines the per-chunk results in chunk order. With
//! a [`ThreadPool`] attached the chunks are submitted through
//! [`ThreadPool::map`]; without one each call starts one scoped thread per
//! chunk and joins all of them before looking at any failure.

use std::cmp::Ordering;
use std::fmt::{Display, Write};
use std::thread;

use crate::chunk;
use crate::error::{ChunkFailure, Error, Result};
use crate::pool::ThreadPool;

/// Runs chunked reductions either on ad-hoc threads or on a shared pool
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallelism<'p> {
    pool: Option<&'p ThreadPool>,
}

impl<'p> Parallelism<'p> {
    /// One short-lived thread per chunk for each call
    pub fn new() -> Self {
        Parallelism { pool: None }
    }

    /// Submit chunks to `pool` instead of spawning threads
    pub fn with_pool(pool: &'p ThreadPool) -> Self {
        Parallelism { pool: Some(pool) }
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Greatest element according to `compare`
    ///
    /// Among equal maxima the last one in the sequence is returned.
    pub fn maximum<'a, T, C>(&self, threads: usize, items: &'a [T], compare: C) -> Result<&'a T>
    where
        T: Sync,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        let maxima = self.apply(threads, items, |chunk| {
            chunk.iter().max_by(|a, b| compare(a, b))
        })?;
        maxima
            .into_iter()
            .flatten()
            .max_by(|a, b| compare(a, b))
            .ok_or(Error::EmptyInput)
    }

    /// Least element according to `compare`, the maximum under the reversed ordering
    pub fn minimum<'a, T, C>(&self, threads: usize, items: &'a [T], compare: C) -> Result<&'a T>
    where
        T: Sync,
        C: Fn(&T, &T) -> Ordering + Sync,
    {
        self.maximum(threads, items, |a, b| compare(b, a))
    }

    /// `true` if every element satisfies `predicate`, vacuously for no elements
    pub fn all<T, P>(&self, threads: usize, items: &[T], predicate: P) -> Result<bool>
    where
        T: Sync,
        P: Fn(&T) -> bool + Sync,
    {
        let verdicts = self.apply(threads, items, |chunk| chunk.iter().all(&predicate))?;
        Ok(verdicts.into_iter().all(|verdict| verdict))
    }

    pub fn any<T, P>(&self, threads: usize, items: &[T], predicate: P) -> Result<bool>
    where
        T: Sync,
        P: Fn(&T) -> bool + Sync,
    {
        self.all(threads, items, |item| !predicate(item))
            .map(|none_match| !none_match)
    }

    /// Concatenated `Display` text of every element, in order
    pub fn join<T>(&self, threads: usize, items: &[T]) -> Result<String>
    where
        T: Display + Sync,
    {
        let parts = self.apply(threads, items, |chunk| {
            let mut text = String::new();
            for item in chunk {
                // writing into a String cannot fail
                write!(text, "{item}").ok();
            }
            text
        })?;
        Ok(parts.concat())
    }

    /// Elements that satisfy `predicate`, in their original relative order
    pub fn filter<T, P>(&self, threads: usize, items: &[T], predicate: P) -> Result<Vec<T>>
    where
        T: Clone + Send + Sync,
        P: Fn(&T) -> bool + Sync,
    {
        let kept = self.apply(threads, items, |chunk| {
            chunk
                .iter()
                .filter(|item| predicate(item))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        Ok(kept.into_iter().flatten().collect())
    }

    pub fn map<T, U, F>(&self, threads: usize, items: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        let mapped = self.apply(threads, items, |chunk| {
            chunk.iter().map(&f).collect::<Vec<_>>()
        })?;
        Ok(mapped.into_iter().flatten().collect())
    }

    // one reduction per chunk, results in chunk order
    fn apply<'a, T, V, F>(&self, threads: usize, items: &'a [T], reduce: F) -> Result<Vec<V>>
    where
        T: Sync,
        V: Send,
        F: Fn(&'a [T]) -> V + Sync,
    {
        let chunks = chunk::split(items, threads)?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        match self.pool {
            Some(pool) => pool.map(|chunk: &&'a [T]| reduce(chunk), &chunks),
            None => run_scoped(&chunks, &reduce),
        }
    }
}

fn run_scoped<'a, T, V, F>(chunks: &[&'a [T]], reduce: &F) -> Result<Vec<V>>
where
    T: Sync,
    V: Send,
    F: Fn(&'a [T]) -> V + Sync,
{
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(chunks.len());
        for (index, &chunk) in chunks.iter().enumerate() {
            let spawned = thread::Builder::new()
                .name(format!("chunk{index}"))
                .spawn_scoped(scope, move || reduce(chunk));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for handle in handles {
                        if handle.join().is_err() {
                            tracing::warn!("chunk thread panicked before spawn failure");
                        }
                    }
                    return Err(Error::Spawn(err));
                }
            }
        }

        // join everything before deciding the outcome
        let mut values = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(value) => values.push(value),
                Err(payload) => failures.push(ChunkFailure::from_panic(index, payload)),
            }
        }

        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                chunks = chunks.len(),
                "chunk threads panicked"
            );
        }
        Error::aggregate(failures)?;
        Ok(values)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_resolve_to_last_element() {
        let items = [(1, 'a'), (3, 'b'), (3, 'c'), (1, 'd')];
        let by_key = |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0);

        for threads in 1..=4 {
            let ops = Parallelism::new();
            assert_eq!(ops.maximum(threads, &items, by_key).unwrap().1, 'c');
            assert_eq!(ops.minimum(threads, &items, by_key).unwrap().1, 'd');
        }
    }

    #[test]
    fn zero_budget_fails_before_work() {
        let ops = Parallelism::new();
        let items = [1, 2, 3];
        assert!(matches!(
            ops.map(0, &items, |x| x + 1),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ops.all(0, &[] as &[i32], |_| true),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn pooled_and_unpooled_agree() {
        let pool = ThreadPool::new(2).unwrap();
        let pooled = Parallelism::with_pool(&pool);
        let unpooled = Parallelism::new();
        assert!(pooled.is_pooled());
        assert!(!unpooled.is_pooled());

        let items: Vec<i32> = (-20..20).collect();
        for threads in [1, 3, 7, 64] {
            assert_eq!(
                pooled.filter(threads, &items, |x| x % 3 == 0).unwrap(),
                unpooled.filter(threads, &items, |x| x % 3 == 0).unwrap()
            );
            assert_eq!(
                pooled.join(threads, &items).unwrap(),
                unpooled.join(threads, &items).unwrap()
            );
        }
    }
}
