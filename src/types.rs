//! Capability tags and their subtype hierarchy
//!
//! Factories declare what they produce with a [`ServiceType`] tag, and
//! callers request services by tag. Whether a produced tag satisfies a
//! requested one is answered by a closed [`TypeHierarchy`] of declared
//! tags with explicit supertype edges.

use crate::{GenerationError, Result};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Name reserved for [`ServiceType::any`]
pub const ANY_TYPE_NAME: &str = "any";

static ANY: Lazy<ServiceType> = Lazy::new(|| ServiceType::new(ANY_TYPE_NAME));

/// A capability tag describing what a factory produces.
///
/// Tags are compared by name. Cloning is a reference count bump.
///
/// The name [`ANY_TYPE_NAME`] is reserved: a tag created with it *is* the
/// universal tag, and a hierarchy refuses to declare it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceType(Arc<str>);

impl ServiceType {
    /// Create a tag with the given name; `"any"` yields [`ServiceType::any`]
    #[inline]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The universal tag every other tag is assignable to
    #[inline]
    pub fn any() -> Self {
        ANY.clone()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        &*self.0 == ANY_TYPE_NAME
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({})", self.0)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ServiceType {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// A closed set of capability tags with explicit supertype edges.
///
/// # Examples
///
/// ```rust
/// use service_generator::{ServiceType, TypeHierarchy};
///
/// let hierarchy = TypeHierarchy::builder()
///     .declare("Number", ["Object"])
///     .declare("Integer", ["Number"])
///     .build()
///     .unwrap();
///
/// let integer = ServiceType::new("Integer");
/// let object = ServiceType::new("Object");
/// assert!(hierarchy.is_assignable(&integer, &object));
/// assert!(!hierarchy.is_assignable(&object, &integer));
/// ```
pub struct TypeHierarchy {
    /// Direct supertypes of every declared tag
    supertypes: HashMap<ServiceType, Vec<ServiceType>, RandomState>,
    /// Memoized `(sub, sup)` answers
    assignable: DashMap<(ServiceType, ServiceType), bool, RandomState>,
}

impl TypeHierarchy {
    /// Start declaring a hierarchy
    #[inline]
    pub fn builder() -> TypeHierarchyBuilder {
        TypeHierarchyBuilder::default()
    }

    /// A hierarchy in which tags are only assignable to themselves and `any`
    pub fn flat() -> Self {
        Self {
            supertypes: HashMap::default(),
            assignable: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Is a value tagged `sub` usable where `sup` is requested?
    ///
    /// True when the tags are equal, when `sup` is [`ServiceType::any`], or
    /// when `sup` is reachable from `sub` through declared supertype edges.
    pub fn is_assignable(&self, sub: &ServiceType, sup: &ServiceType) -> bool {
        if sub == sup || sup.is_any() {
            return true;
        }
        if sub.is_any() {
            return false;
        }

        let key = (sub.clone(), sup.clone());
        if let Some(known) = self.assignable.get(&key) {
            return *known;
        }

        let answer = self.reaches(sub, sup);

        #[cfg(feature = "logging")]
        trace!(
            target: "service_generator",
            sub = sub.name(),
            sup = sup.name(),
            assignable = answer,
            "Computed type assignability"
        );

        self.assignable.insert(key, answer);
        answer
    }

    /// Every tag `ty` is assignable to, excluding itself and `any`
    pub fn supertypes(&self, ty: &ServiceType) -> Vec<ServiceType> {
        let mut seen: HashSet<ServiceType, RandomState> = HashSet::default();
        let mut pending: Vec<&ServiceType> = self.direct(ty).iter().collect();
        let mut closure = Vec::new();

        while let Some(next) = pending.pop() {
            if seen.insert(next.clone()) {
                closure.push(next.clone());
                pending.extend(self.direct(next));
            }
        }

        closure.sort();
        closure
    }

    /// Whether `ty` was passed to `declare` or named as a supertype
    pub fn is_declared(&self, ty: &ServiceType) -> bool {
        ty.is_any()
            || self.supertypes.contains_key(ty)
            || self.supertypes.values().any(|sups| sups.contains(ty))
    }

    /// Number of tags passed to `declare`
    #[inline]
    pub fn len(&self) -> usize {
        self.supertypes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.supertypes.is_empty()
    }

    #[inline]
    fn direct(&self, ty: &ServiceType) -> &[ServiceType] {
        self.supertypes.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    fn reaches(&self, from: &ServiceType, to: &ServiceType) -> bool {
        let mut seen: HashSet<&ServiceType, RandomState> = HashSet::default();
        let mut pending = vec![from];

        while let Some(next) = pending.pop() {
            for sup in self.direct(next) {
                if sup == to {
                    return true;
                }
                if seen.insert(sup) {
                    pending.push(sup);
                }
            }
        }
        false
    }
}

impl Default for TypeHierarchy {
    fn default() -> Self {
        Self::flat()
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHierarchy")
            .field("declared", &self.supertypes.len())
            .field("cached", &self.assignable.len())
            .finish()
    }
}

/// Collects supertype edges, then validates them into a [`TypeHierarchy`].
#[derive(Debug, Default)]
pub struct TypeHierarchyBuilder {
    declared: Vec<ServiceType>,
    edges: Vec<(ServiceType, ServiceType)>,
}

impl TypeHierarchyBuilder {
    /// Declare `ty` as a direct subtype of every tag in `supertypes`
    pub fn declare<T, I, S>(mut self, ty: T, supertypes: I) -> Self
    where
        T: Into<ServiceType>,
        I: IntoIterator<Item = S>,
        S: Into<ServiceType>,
    {
        let ty = ty.into();
        self.declared.push(ty.clone());
        for sup in supertypes {
            self.edges.push((ty.clone(), sup.into()));
        }
        self
    }

    /// Validate the edges and freeze the hierarchy.
    ///
    /// Fails with [`GenerationError::InvalidHierarchy`] when a tag would end
    /// up a strict subtype of itself, or when the reserved `any` tag is
    /// declared.
    pub fn build(self) -> Result<TypeHierarchy> {
        let mut supertypes: HashMap<ServiceType, Vec<ServiceType>, RandomState> = HashMap::default();

        for ty in self.declared {
            if ty.is_any() {
                return Err(GenerationError::InvalidHierarchy {
                    reason: format!("{ANY_TYPE_NAME} is reserved for the universal tag and cannot be declared"),
                });
            }
            supertypes.entry(ty).or_default();
        }

        for (sub, sup) in self.edges {
            if sub == sup {
                return Err(GenerationError::InvalidHierarchy {
                    reason: format!("{sub} is declared as its own supertype"),
                });
            }
            if sup.is_any() {
                continue;
            }
            let direct = supertypes.entry(sub).or_default();
            if !direct.contains(&sup) {
                direct.push(sup);
            }
        }

        let hierarchy = TypeHierarchy {
            supertypes,
            assignable: DashMap::with_hasher(RandomState::new()),
        };

        for ty in hierarchy.supertypes.keys() {
            if hierarchy.reaches(ty, ty) {
                return Err(GenerationError::InvalidHierarchy {
                    reason: format!("{ty} is its own supertype through a cycle"),
                });
            }
        }

        Ok(hierarchy)
    }
}
