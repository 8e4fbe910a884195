//! Ordered overload sets.

use std::fmt;
use std::rc::Rc;

use scriptbind_core::{CallContext, NativeError, NativeFn, ObjectHeap, ScriptValue};

use super::{CallOptions, NativeConstructor, NativeFunction, NativeMethod, NativeMethodMut, Outcome};
use crate::convert::ScriptType;
use crate::descriptor::Signature;

type Predicate = fn(&[ScriptValue], &ObjectHeap) -> bool;
type Invoker = Rc<dyn Fn(&mut CallContext, CallOptions) -> Result<Outcome, NativeError>>;

fn erase<F>(f: F) -> Invoker
where
    F: Fn(&mut CallContext, CallOptions) -> Result<Outcome, NativeError> + 'static,
{
    Rc::new(f)
}

/// One entry of an overload set.
///
/// Carries everything needed to probe the candidate without running it:
/// its arity and its acceptance predicate.
#[derive(Clone)]
pub struct OverloadCandidate {
    /// Number of script arguments
    pub arity: usize,
    /// Per-argument acceptance, including the count check
    pub predicate: Predicate,
    /// Options the candidate was bound with
    pub options: CallOptions,
    /// Reflection signature
    pub signature: Signature,
    invoker: Invoker,
}

impl OverloadCandidate {
    /// Candidate for a free function.
    pub fn function<F, Args, R>(f: F, options: CallOptions) -> Self
    where
        F: NativeFunction<Args, R>,
        Args: 'static,
        R: 'static,
    {
        Self {
            arity: F::ARITY,
            predicate: F::accepts,
            options,
            signature: F::signature(),
            invoker: erase(move |ctx, opts| f.invoke(ctx, opts)),
        }
    }

    /// Candidate for a `&T` method.
    pub fn method<T, F, Args, R>(f: F, options: CallOptions) -> Self
    where
        T: ScriptType,
        F: NativeMethod<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        Self {
            arity: F::ARITY,
            predicate: F::accepts,
            options,
            signature: F::signature(),
            invoker: erase(move |ctx, opts| f.invoke(ctx, opts)),
        }
    }

    /// Candidate for a `&mut T` method.
    pub fn method_mut<T, F, Args, R>(f: F, options: CallOptions) -> Self
    where
        T: ScriptType,
        F: NativeMethodMut<T, Args, R>,
        Args: 'static,
        R: 'static,
    {
        Self {
            arity: F::ARITY,
            predicate: F::accepts,
            options,
            signature: F::signature(),
            invoker: erase(move |ctx, opts| f.invoke(ctx, opts)),
        }
    }

    /// Candidate for a constructor of `T`.
    pub fn constructor<T, F, Args>(f: F) -> Self
    where
        T: ScriptType,
        F: NativeConstructor<T, Args>,
        Args: 'static,
    {
        Self {
            arity: F::ARITY,
            predicate: F::accepts,
            options: CallOptions::checked(),
            signature: F::signature(),
            invoker: erase(move |ctx, opts| f.invoke(ctx, opts)),
        }
    }

    /// Whether this candidate would accept the call's arguments.
    pub fn matches(&self, ctx: &CallContext) -> bool {
        self.arity == ctx.arg_count() && (self.predicate)(ctx.args(), ctx.heap())
    }

    /// Run the candidate.
    pub fn invoke(
        &self,
        ctx: &mut CallContext,
        options: CallOptions,
    ) -> Result<Outcome, NativeError> {
        (self.invoker)(ctx, options)
    }
}

impl fmt::Debug for OverloadCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverloadCandidate")
            .field("arity", &self.arity)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Callables sharing one script name, probed in registration order.
///
/// A set with more than one candidate always screens arguments; the first
/// candidate whose count and predicates match is invoked and no later
/// candidate is considered.
#[derive(Clone)]
pub struct OverloadSet {
    name: String,
    candidates: Vec<OverloadCandidate>,
    always_check: bool,
}

impl OverloadSet {
    /// Create an empty set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
            always_check: false,
        }
    }

    /// Create an empty set that screens even a single candidate.
    pub fn checked(name: impl Into<String>) -> Self {
        Self {
            always_check: true,
            ..Self::new(name)
        }
    }

    /// Append a candidate.
    pub fn push(&mut self, candidate: OverloadCandidate) {
        self.candidates.push(candidate);
    }

    /// Append a candidate, builder style.
    pub fn with(mut self, candidate: OverloadCandidate) -> Self {
        self.push(candidate);
        self
    }

    /// Script-visible name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidates in registration order.
    pub fn candidates(&self) -> &[OverloadCandidate] {
        &self.candidates
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Check if the set has no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether dispatch screens arguments before invoking.
    pub fn is_checked(&self) -> bool {
        self.always_check
            || self.candidates.len() > 1
            || self
                .candidates
                .first()
                .is_some_and(|c| c.options.check_arguments)
    }

    /// Signature of the only candidate, if there is exactly one.
    pub fn single_signature(&self) -> Option<&Signature> {
        match self.candidates.as_slice() {
            [only] => Some(&only.signature),
            _ => None,
        }
    }

    /// Resolve and invoke.
    ///
    /// Fails with `OverloadMismatch` if no candidate accepts the arguments.
    /// Errors raised by the chosen candidate are final.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn dispatch(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        if !self.is_checked() {
            let Some(only) = self.candidates.first() else {
                return Err(NativeError::OverloadMismatch);
            };
            return match only.invoke(ctx, only.options)? {
                Outcome::Completed => Ok(()),
                Outcome::Rejected => Err(NativeError::OverloadMismatch),
            };
        }

        for (index, candidate) in self.candidates.iter().enumerate() {
            if !candidate.matches(ctx) {
                tracing::trace!(name = %self.name, candidate = index, "overload rejected");
                continue;
            }
            let options = CallOptions {
                check_arguments: false,
                ..candidate.options
            };
            return match candidate.invoke(ctx, options)? {
                Outcome::Completed => Ok(()),
                Outcome::Rejected => Err(NativeError::OverloadMismatch),
            };
        }

        tracing::debug!(
            name = %self.name,
            arg_count = ctx.arg_count(),
            candidates = self.candidates.len(),
            "no overload matched"
        );
        Err(NativeError::OverloadMismatch)
    }

    /// Wrap the set in a host-callable thunk.
    pub fn into_native_fn(self) -> NativeFn {
        NativeFn::new(move |ctx: &mut CallContext| self.dispatch(ctx))
    }
}

impl fmt::Debug for OverloadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverloadSet")
            .field("name", &self.name)
            .field("candidates", &self.candidates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    fn run(set: &OverloadSet, args: &mut [ScriptValue]) -> Result<ScriptValue, NativeError> {
        let mut heap = ObjectHeap::new();
        let mut ret = ScriptValue::Undefined;
        let mut ctx = CallContext::new(args, 0, &mut ret, &mut heap);
        set.dispatch(&mut ctx)?;
        Ok(ret)
    }

    #[test]
    fn picks_by_arity_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (one, two) = (Rc::clone(&log), Rc::clone(&log));
        let set = OverloadSet::new("f")
            .with(OverloadCandidate::function(
                move |a: i32| one.borrow_mut().push(format!("f({a})")),
                CallOptions::default(),
            ))
            .with(OverloadCandidate::function(
                move |a: i32, b: i32| two.borrow_mut().push(format!("f({a}, {b})")),
                CallOptions::default(),
            ));

        run(&set, &mut [ScriptValue::Int(1)]).unwrap();
        run(&set, &mut [ScriptValue::Int(1), ScriptValue::Int(2)]).unwrap();
        assert!(matches!(run(&set, &mut []), Err(NativeError::OverloadMismatch)));

        assert_eq!(*log.borrow(), vec!["f(1)".to_string(), "f(1, 2)".to_string()]);
    }

    #[test]
    fn first_acceptable_candidate_wins() {
        let set = OverloadSet::new("g")
            .with(OverloadCandidate::function(|_: String| 1, CallOptions::default()))
            .with(OverloadCandidate::function(|_: f64| 2, CallOptions::default()))
            .with(OverloadCandidate::function(|_: i32| 3, CallOptions::default()));

        // ints are acceptable floats, so the double overload shadows the int one
        assert_eq!(run(&set, &mut [ScriptValue::Int(5)]).unwrap(), ScriptValue::Int(2));
        assert_eq!(run(&set, &mut [ScriptValue::String("s".into())]).unwrap(), ScriptValue::Int(1));
    }

    #[test]
    fn single_unchecked_candidate_reports_arity() {
        let candidate = OverloadCandidate::function(|_: i32| (), CallOptions::unchecked());
        let set = OverloadSet::new("h").with(candidate);
        assert!(!set.is_checked());
        let err = run(&set, &mut []).unwrap_err();
        assert_eq!(err.to_string(), "expected 1 arguments, got 0");
    }

    #[test]
    fn single_checked_candidate_reports_mismatch() {
        let candidate = OverloadCandidate::function(|_: i32| (), CallOptions::checked());
        let set = OverloadSet::new("h").with(candidate);
        assert!(set.is_checked());
        assert!(matches!(
            run(&set, &mut [ScriptValue::Bool(true)]),
            Err(NativeError::OverloadMismatch)
        ));
    }

    #[test]
    fn empty_set_never_matches() {
        let set = OverloadSet::new("nothing");
        assert!(matches!(run(&set, &mut []), Err(NativeError::OverloadMismatch)));
    }

    #[test]
    fn single_signature_only_for_one_candidate() {
        let mut set = OverloadSet::new("s");
        set.push(OverloadCandidate::function(|a: i32| a, CallOptions::default()));
        assert_eq!(set.single_signature().unwrap().to_string(), "int(int)");
        set.push(OverloadCandidate::function(|a: i32, _: i32| a, CallOptions::default()));
        assert!(set.single_signature().is_none());
    }
}
