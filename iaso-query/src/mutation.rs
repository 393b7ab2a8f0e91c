//! Snack mutations: writes that report their outcome and refresh dependent queries
//!
//! On success the wrapper enqueues the success notification, then
//! invalidates the configured keys, then calls the caller's `on_success`.
//! On failure it enqueues the error notification unless the status is
//! ignored, then calls the caller's `on_error`. Positional call sites use
//! the order `(mutation_fn, snack_success_message, snack_error_msg,
//! invalidate_query_key, options, show_success_snack_bar,
//! ignore_error_codes, success_snack_bar)`.

use iaso_caching::{
    MutationFn, MutationObserver, MutationOnError, MutationOnSuccess, MutationOptions, QueryKey,
};
use iaso_core::{ApiError, SnackMessage};
use std::sync::Arc;
use tracing::debug;

use crate::client::SnackClient;
use crate::snackbar::{
    default_success_snack_bar, mutation_error_notification, mutation_success_notification,
    SuccessSnackBar,
};

/// Query keys invalidated after a successful mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidateKeys(Vec<QueryKey>);

impl InvalidateKeys {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryKey> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<QueryKey> for InvalidateKeys {
    fn from(key: QueryKey) -> Self {
        Self(vec![key])
    }
}

impl From<&str> for InvalidateKeys {
    fn from(key: &str) -> Self {
        Self(vec![key.into()])
    }
}

impl From<Vec<QueryKey>> for InvalidateKeys {
    fn from(keys: Vec<QueryKey>) -> Self {
        Self(keys)
    }
}

impl From<Vec<&str>> for InvalidateKeys {
    fn from(keys: Vec<&str>) -> Self {
        Self(keys.into_iter().map(QueryKey::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for InvalidateKeys {
    fn from(keys: [&str; N]) -> Self {
        Self(keys.into_iter().map(QueryKey::from).collect())
    }
}

impl<K: Into<InvalidateKeys>> From<Option<K>> for InvalidateKeys {
    fn from(keys: Option<K>) -> Self {
        keys.map(Into::into).unwrap_or_default()
    }
}

/// Everything a snack mutation needs
pub struct MutationDescriptor<V, T> {
    pub mutation_fn: MutationFn<V, T>,
    pub snack_success_message: SnackMessage,
    pub snack_error_msg: SnackMessage,
    pub invalidate_query_key: InvalidateKeys,
    pub options: MutationOptions<V, T>,
    pub show_success_snack_bar: bool,
    /// Statuses handled by the caller, typically form validation errors
    pub ignore_error_codes: Vec<u16>,
    pub success_snack_bar: SuccessSnackBar<T>,
}

impl<V, T> Clone for MutationDescriptor<V, T> {
    fn clone(&self) -> Self {
        Self {
            mutation_fn: self.mutation_fn.clone(),
            snack_success_message: self.snack_success_message.clone(),
            snack_error_msg: self.snack_error_msg.clone(),
            invalidate_query_key: self.invalidate_query_key.clone(),
            options: self.options.clone(),
            show_success_snack_bar: self.show_success_snack_bar,
            ignore_error_codes: self.ignore_error_codes.clone(),
            success_snack_bar: self.success_snack_bar.clone(),
        }
    }
}

impl<V, T> std::fmt::Debug for MutationDescriptor<V, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationDescriptor")
            .field("snack_success_message", &self.snack_success_message)
            .field("snack_error_msg", &self.snack_error_msg)
            .field("invalidate_query_key", &self.invalidate_query_key)
            .field("show_success_snack_bar", &self.show_success_snack_bar)
            .field("ignore_error_codes", &self.ignore_error_codes)
            .finish()
    }
}

impl<V, T: 'static> MutationDescriptor<V, T> {
    pub fn new(mutation_fn: MutationFn<V, T>) -> Self {
        Self {
            mutation_fn,
            snack_success_message: SnackMessage::Default,
            snack_error_msg: SnackMessage::Default,
            invalidate_query_key: InvalidateKeys::none(),
            options: MutationOptions::default(),
            show_success_snack_bar: true,
            ignore_error_codes: Vec::new(),
            success_snack_bar: default_success_snack_bar(),
        }
    }

    pub fn snack_success_message(mut self, message: impl Into<SnackMessage>) -> Self {
        self.snack_success_message = message.into();
        self
    }

    pub fn snack_error_msg(mut self, message: impl Into<SnackMessage>) -> Self {
        self.snack_error_msg = message.into();
        self
    }

    pub fn invalidate_query_key(mut self, keys: impl Into<InvalidateKeys>) -> Self {
        self.invalidate_query_key = keys.into();
        self
    }

    pub fn options(mut self, options: MutationOptions<V, T>) -> Self {
        self.options = options;
        self
    }

    pub fn show_success_snack_bar(mut self, show: bool) -> Self {
        self.show_success_snack_bar = show;
        self
    }

    pub fn ignore_error_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignore_error_codes = codes.into_iter().collect();
        self
    }

    pub fn success_snack_bar(mut self, factory: SuccessSnackBar<T>) -> Self {
        self.success_snack_bar = factory;
        self
    }

    fn into_positional(self) -> MutationCall<V, T> {
        MutationCall::Positional {
            mutation_fn: self.mutation_fn,
            snack_success_message: self.snack_success_message,
            snack_error_msg: self.snack_error_msg,
            invalidate_query_key: self.invalidate_query_key,
            options: self.options,
            show_success_snack_bar: self.show_success_snack_bar,
            ignore_error_codes: self.ignore_error_codes,
            success_snack_bar: self.success_snack_bar,
        }
    }
}

/// The two accepted call shapes of a snack mutation
pub enum MutationCall<V, T> {
    Descriptor(MutationDescriptor<V, T>),
    Positional {
        mutation_fn: MutationFn<V, T>,
        snack_success_message: SnackMessage,
        snack_error_msg: SnackMessage,
        invalidate_query_key: InvalidateKeys,
        options: MutationOptions<V, T>,
        show_success_snack_bar: bool,
        ignore_error_codes: Vec<u16>,
        success_snack_bar: SuccessSnackBar<T>,
    },
}

impl<V, T> MutationCall<V, T> {
    /// Normalize into a descriptor
    pub fn resolve(self) -> MutationDescriptor<V, T> {
        match self {
            MutationCall::Descriptor(descriptor) => descriptor,
            MutationCall::Positional {
                mutation_fn,
                snack_success_message,
                snack_error_msg,
                invalidate_query_key,
                options,
                show_success_snack_bar,
                ignore_error_codes,
                success_snack_bar,
            } => MutationDescriptor {
                mutation_fn,
                snack_success_message,
                snack_error_msg,
                invalidate_query_key,
                options,
                show_success_snack_bar,
                ignore_error_codes,
                success_snack_bar,
            },
        }
    }
}

impl<V, T> From<MutationDescriptor<V, T>> for MutationCall<V, T> {
    fn from(descriptor: MutationDescriptor<V, T>) -> Self {
        MutationCall::Descriptor(descriptor)
    }
}

impl<V, T: 'static> From<MutationFn<V, T>> for MutationCall<V, T> {
    fn from(mutation_fn: MutationFn<V, T>) -> Self {
        MutationCall::Descriptor(MutationDescriptor::new(mutation_fn))
    }
}

/// Positional conversions for every accepted arity. Arguments left out keep
/// the defaults of [`MutationDescriptor::new`].
macro_rules! positional_mutation {
    ($(($($arg:ident: $ty:ty => $setter:ident),*)),* $(,)?) => {
        $(
            impl<V, T, S, E, I> From<(MutationFn<V, T>, $($ty),*)> for MutationCall<V, T>
            where
                T: 'static,
                S: Into<SnackMessage>,
                E: Into<SnackMessage>,
                I: Into<InvalidateKeys>,
            {
                fn from((mutation_fn, $($arg),*): (MutationFn<V, T>, $($ty),*)) -> Self {
                    MutationDescriptor::new(mutation_fn)
                        $(.$setter($arg))*
                        .into_positional()
                }
            }
        )*
    };
}

positional_mutation! {
    (
        success: S => snack_success_message,
        error: E => snack_error_msg,
        keys: I => invalidate_query_key
    ),
    (
        success: S => snack_success_message,
        error: E => snack_error_msg,
        keys: I => invalidate_query_key,
        options: MutationOptions<V, T> => options
    ),
    (
        success: S => snack_success_message,
        error: E => snack_error_msg,
        keys: I => invalidate_query_key,
        options: MutationOptions<V, T> => options,
        show: bool => show_success_snack_bar
    ),
    (
        success: S => snack_success_message,
        error: E => snack_error_msg,
        keys: I => invalidate_query_key,
        options: MutationOptions<V, T> => options,
        show: bool => show_success_snack_bar,
        ignore: Vec<u16> => ignore_error_codes
    ),
    (
        success: S => snack_success_message,
        error: E => snack_error_msg,
        keys: I => invalidate_query_key,
        options: MutationOptions<V, T> => options,
        show: bool => show_success_snack_bar,
        ignore: Vec<u16> => ignore_error_codes,
        factory: SuccessSnackBar<T> => success_snack_bar
    ),
}

impl SnackClient {
    /// Create a mutation whose outcome is reported as notifications.
    ///
    /// The mutation is never retried unless its options ask for it.
    pub fn snack_mutation<V, T>(&self, call: impl Into<MutationCall<V, T>>) -> MutationObserver<V, T>
    where
        V: Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let descriptor = call.into().resolve();
        let mut options = descriptor.options.clone();
        options.on_success = Some(self.wrap_success(&descriptor));
        options.on_error = Some(self.wrap_error(&descriptor));
        self.queries().mutation(descriptor.mutation_fn, options)
    }

    fn wrap_success<V, T>(&self, descriptor: &MutationDescriptor<V, T>) -> MutationOnSuccess<V, T>
    where
        V: Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let client = self.clone();
        let message = descriptor.snack_success_message.clone();
        let show = descriptor.show_success_snack_bar;
        let factory = descriptor.success_snack_bar.clone();
        let keys = descriptor.invalidate_query_key.clone();
        let forward = descriptor.options.on_success.clone();

        Arc::new(move |data: &T, variables: &V| {
            let default = &client.messages().mutation_success;
            if let Some(notification) =
                mutation_success_notification(&message, default, show, &factory, data)
            {
                client.notifications().enqueue(notification);
            }
            for key in keys.iter() {
                client.invalidate(key);
            }
            if let Some(forward) = &forward {
                forward(data, variables);
            }
        })
    }

    fn wrap_error<V, T>(&self, descriptor: &MutationDescriptor<V, T>) -> MutationOnError<V>
    where
        V: Send + Sync + 'static,
    {
        let client = self.clone();
        let message = descriptor.snack_error_msg.clone();
        let ignore_error_codes = descriptor.ignore_error_codes.clone();
        let forward = descriptor.options.on_error.clone();

        Arc::new(move |error: &ApiError, variables: &V| {
            let default = &client.messages().mutation_error;
            match mutation_error_notification(&message, default, &ignore_error_codes, error) {
                Some(notification) => client.notifications().enqueue(notification),
                None => debug!("No notification for failed mutation: {}", error),
            }
            if let Some(forward) = &forward {
                forward(error, variables);
            }
        })
    }
}
