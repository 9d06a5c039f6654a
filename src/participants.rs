//! This module holds some utilities for working with participants.
//!
//! Often you need to do things like storing one item for each participant,
//! or checking that everybody has sent a message for some round.
//! This module tries to provide useful data structures for doing that.

use std::{collections::HashMap, ops::Index};

use serde::Serialize;

use crate::protocol::Participant;

/// Represents a sorted list of participants.
///
/// The advantage of this data structure is that it can be hashed in the protocol transcript,
/// since everybody will agree on its order.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantList {
    participants: Vec<Participant>,
    /// This maps each participant to their index in the vector above.
    #[serde(skip_serializing)]
    indices: HashMap<Participant, usize>,
}

impl ParticipantList {
    /// Create a participant list from a slice of participants.
    ///
    /// This will return None if the participants have duplicates.
    pub fn new(participants: &[Participant]) -> Option<Self> {
        let mut out = participants.to_owned();
        out.sort();

        let indices: HashMap<_, _> = out.iter().enumerate().map(|(p, x)| (*x, p)).collect();

        if indices.len() < out.len() {
            return None;
        }

        Some(Self {
            participants: out,
            indices,
        })
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if this list has a given participant.
    pub fn contains(&self, participant: Participant) -> bool {
        self.indices.contains_key(&participant)
    }

    /// Iterate over all participants, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = Participant> + '_ {
        self.participants.iter().copied()
    }

    /// Return the index of a given participant.
    ///
    /// Basically, the order they appear in a sorted list
    pub fn index(&self, participant: Participant) -> Option<usize> {
        self.indices.get(&participant).copied()
    }
}

/// A map from participants to elements.
///
/// The idea is that you have one element for each participant.
#[derive(Debug, Clone)]
pub struct ParticipantMap<'a, T> {
    participants: &'a ParticipantList,
    data: Vec<Option<T>>,
    count: usize,
}

impl<'a, T> ParticipantMap<'a, T> {
    /// Create a new map from a list of participants.
    ///
    /// This map only lives as long as that list of participants.
    pub fn new(participants: &'a ParticipantList) -> Self {
        let size = participants.len();
        let mut data = Vec::with_capacity(size);
        data.resize_with(size, || None);

        Self {
            participants,
            data,
            count: 0,
        }
    }

    /// Check if this map is full, i.e. if every participant has put something in.
    pub fn full(&self) -> bool {
        self.count == self.data.len()
    }

    /// The number of participants who have put something in.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if this map contains data from a specific participant.
    pub fn contains(&self, participant: Participant) -> bool {
        self.participants
            .index(participant)
            .map_or(false, |i| self.data[i].is_some())
    }

    /// Place the data for a participant in this map.
    ///
    /// This returns false, leaving the map untouched, if the participant is unknown
    /// or has already put something in.
    pub fn put(&mut self, participant: Participant, data: T) -> bool {
        let i = match self.participants.index(participant) {
            Some(i) => i,
            None => return false,
        };
        if self.data[i].is_some() {
            return false;
        }

        self.data[i] = Some(data);
        self.count += 1;
        true
    }

    /// Iterate over the entries, in participant order.
    pub fn iter(&self) -> impl Iterator<Item = (Participant, &T)> + '_ {
        self.participants
            .iter()
            .zip(self.data.iter())
            .filter_map(|(p, x)| x.as_ref().map(|x| (p, x)))
    }

    /// Consume the map, returning the entries in participant order.
    ///
    /// This returns None unless the map is full.
    pub fn into_vec_or_none(self) -> Option<Vec<T>> {
        self.data.into_iter().collect()
    }
}

impl<'a, T> Index<Participant> for ParticipantMap<'a, T> {
    type Output = T;

    /// Panics if the participant hasn't put anything in yet.
    fn index(&self, index: Participant) -> &Self::Output {
        let i = self.participants.indices[&index];
        self.data[i]
            .as_ref()
            .expect("participant has no entry in this map")
    }
}
