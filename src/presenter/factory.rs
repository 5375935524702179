//! # Presenter factory and owner association.
//!
//! [`PresenterFactory`] is an explicit, startup-time registry mapping a
//! presenter type to its constructor. Resolution happens by type, never by
//! reflection or ambient globals: register every presenter type once when
//! the application wires itself up, then hand the factory to each
//! provider. Asking for an unregistered type is a configuration error and
//! fails loudly.
//!
//! [`HasPresenter`] declares, at compile time, which presenter type a view
//! owner uses.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use crate::error::PresenterError;
use crate::presenter::lifecycle::Presenter;

/// Associates a view owner with its presenter type.
///
/// ```
/// use viewvisor::{HasPresenter, Presenter};
///
/// struct WeatherPresenter;
/// impl Presenter for WeatherPresenter {
///     type View = String;
/// }
///
/// struct WeatherScreen;
/// impl HasPresenter for WeatherScreen {
///     type Presenter = WeatherPresenter;
/// }
/// ```
pub trait HasPresenter {
    /// The presenter type driving this owner.
    type Presenter: Presenter;
}

type Creator = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// Startup-time registry of presenter constructors.
#[derive(Default)]
pub struct PresenterFactory {
    creators: HashMap<TypeId, Creator>,
}

impl PresenterFactory {
    /// Creates an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for presenter type `P`, replacing any
    /// previous registration.
    pub fn register<P: Presenter>(&mut self, create: impl Fn() -> P + Send + Sync + 'static) {
        self.creators
            .insert(TypeId::of::<P>(), Box::new(move || Box::new(create())));
    }

    /// True if a constructor for `P` is registered.
    pub fn is_registered<P: Presenter>(&self) -> bool {
        self.creators.contains_key(&TypeId::of::<P>())
    }

    /// Constructs a fresh presenter of type `P`.
    ///
    /// Fails with [`PresenterError::NotProvided`] when no constructor was
    /// registered — a configuration error, not a recoverable condition.
    pub fn create<P: Presenter>(&self) -> Result<P, PresenterError> {
        let creator = self
            .creators
            .get(&TypeId::of::<P>())
            .ok_or(PresenterError::NotProvided {
                type_name: type_name::<P>(),
            })?;
        creator()
            .downcast::<P>()
            .map(|boxed| *boxed)
            .map_err(|_| PresenterError::NotProvided {
                type_name: type_name::<P>(),
            })
    }
}
